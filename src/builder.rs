//! Incremental construction of the typed tree from the event stream.
//!
//! Every page and revision is linked into its parent the moment its start
//! tag arrives and is then filled in place. A [`BuildListener`] is told just
//! before each page or revision is created and just after each page,
//! revision and the root is complete, with mutable access to the parent, so
//! it can unlink finished nodes it does not want while the parse goes on.

use crate::config::{PAGE_ELEMENT, REVISION_ELEMENT, TEXT_ELEMENT, TITLE_ELEMENT};
use crate::event::{Attribute, Event, EventSink};
use crate::models::{Contributor, Element, MediaWiki, Node, Page, PageItem, Revision};
use anyhow::{bail, Context, Result};
use tracing::warn;

/// A node about to be created, with the parent it will be appended to.
pub enum Creating<'a> {
    Page { root: &'a mut MediaWiki },
    Revision { page: &'a mut Page },
}

/// A node just completed, located by its index in the parent.
pub enum Completed<'a> {
    Revision { page: &'a mut Page, index: usize },
    Page { root: &'a mut MediaWiki, index: usize },
    Root { root: &'a mut MediaWiki },
}

pub trait BuildListener {
    fn node_will_be_created(&mut self, _node: Creating<'_>) {}
    fn node_complete(&mut self, _node: Completed<'_>) {}
}

/// Keeps everything.
impl BuildListener for () {}

impl<L: BuildListener + ?Sized> BuildListener for &mut L {
    fn node_will_be_created(&mut self, node: Creating<'_>) {
        (**self).node_will_be_created(node)
    }

    fn node_complete(&mut self, node: Completed<'_>) {
        (**self).node_complete(node)
    }
}

enum Frame {
    Root,
    Page,
    Revision,
    Contributor,
    /// Simple text-valued child of a typed node
    Field {
        name: String,
        attrs: Vec<Attribute>,
        text: String,
    },
    Opaque(Element),
}

pub struct TreeBuilder<L> {
    root: MediaWiki,
    stack: Vec<Frame>,
    listener: L,
    last_serial: u64,
    current_page: Option<u64>,
    current_revision: Option<u64>,
    root_seen: bool,
}

impl<L: BuildListener> TreeBuilder<L> {
    pub fn new(listener: L) -> Self {
        Self {
            root: MediaWiki::default(),
            stack: Vec::new(),
            listener,
            last_serial: 0,
            current_page: None,
            current_revision: None,
            root_seen: false,
        }
    }

    /// Completes any still-open nodes and hands back the tree.
    pub fn finish(mut self) -> Result<(MediaWiki, L)> {
        self.complete_open_nodes()?;
        Ok((self.root, self.listener))
    }

    fn next_serial(&mut self) -> u64 {
        self.last_serial += 1;
        self.last_serial
    }

    fn start(&mut self, name: &str, attrs: &[Attribute]) -> Result<()> {
        let Some(top) = self.stack.last() else {
            if self.root_seen {
                bail!("Element <{}> after the document root", name);
            }
            self.root_seen = true;
            self.root.attrs = attrs.to_vec();
            self.stack.push(Frame::Root);
            return Ok(());
        };

        let frame = match (top, name) {
            (Frame::Root, PAGE_ELEMENT) => return self.open_page(),
            (Frame::Page, REVISION_ELEMENT) => return self.open_revision(),
            (Frame::Page, TITLE_ELEMENT | "ns" | "id" | "redirect") => field(name, attrs),
            (Frame::Revision, "contributor") => {
                let revision = current_revision(&mut self.root, self.current_page, self.current_revision)?;
                revision.contributor = Some(Contributor {
                    attrs: attrs.to_vec(),
                    ..Default::default()
                });
                Frame::Contributor
            }
            (
                Frame::Revision,
                "id" | "parentid" | "timestamp" | "minor" | "comment" | "model" | "format" | TEXT_ELEMENT
                | "sha1",
            ) => field(name, attrs),
            (Frame::Contributor, "username" | "id" | "ip") => field(name, attrs),
            _ => Frame::Opaque(Element::new(name, attrs.to_vec())),
        };
        self.stack.push(frame);
        Ok(())
    }

    fn open_page(&mut self) -> Result<()> {
        self.listener.node_will_be_created(Creating::Page {
            root: &mut self.root,
        });
        let serial = self.next_serial();
        self.root.pages.push(Page {
            serial,
            ..Default::default()
        });
        self.current_page = Some(serial);
        self.stack.push(Frame::Page);
        Ok(())
    }

    fn open_revision(&mut self) -> Result<()> {
        let serial = self.next_serial();
        let page = current_page(&mut self.root, self.current_page)?;
        self.listener
            .node_will_be_created(Creating::Revision { page: &mut *page });
        page.items.push(PageItem::Revision(Revision {
            serial,
            ..Default::default()
        }));
        self.current_revision = Some(serial);
        self.stack.push(Frame::Revision);
        Ok(())
    }

    fn text(&mut self, chunk: &str) {
        match self.stack.last_mut() {
            Some(Frame::Field { text, .. }) => text.push_str(chunk),
            Some(Frame::Opaque(element)) => element.push_text(chunk),
            // Inter-element whitespace of typed nodes
            _ => {}
        }
    }

    fn end(&mut self) -> Result<()> {
        let Some(frame) = self.stack.pop() else {
            bail!("End element with no open element");
        };
        match frame {
            Frame::Root => {
                self.listener.node_complete(Completed::Root {
                    root: &mut self.root,
                });
            }
            Frame::Page => {
                let serial = self.current_page.take().context("No page is open")?;
                let index = self
                    .root
                    .position_of_page(serial)
                    .context("Page under construction is missing from the tree")?;
                self.listener.node_complete(Completed::Page {
                    root: &mut self.root,
                    index,
                });
            }
            Frame::Revision => {
                let serial = self.current_revision.take().context("No revision is open")?;
                let page = current_page(&mut self.root, self.current_page)?;
                let index = page
                    .position_of_revision(serial)
                    .context("Revision under construction is missing from the tree")?;
                self.listener.node_complete(Completed::Revision { page, index });
            }
            Frame::Contributor => {}
            Frame::Field { name, attrs, text } => self.assign(&name, attrs, text)?,
            Frame::Opaque(element) => self.attach(element)?,
        }
        Ok(())
    }

    fn assign(&mut self, name: &str, attrs: Vec<Attribute>, text: String) -> Result<()> {
        match self.stack.last() {
            Some(Frame::Page) => {
                let page = current_page(&mut self.root, self.current_page)?;
                match name {
                    TITLE_ELEMENT => page.title = text,
                    "ns" => page.ns = Some(text),
                    "id" => page.id = Some(text),
                    _ => {
                        let target = attrs.into_iter().find(|a| a.name == "title").map(|a| a.value);
                        page.redirect = Some(target.unwrap_or(text));
                    }
                }
            }
            Some(Frame::Revision) => {
                let revision = current_revision(&mut self.root, self.current_page, self.current_revision)?;
                match name {
                    "id" => revision.id = Some(text),
                    "parentid" => revision.parent_id = Some(text),
                    "timestamp" => revision.timestamp = Some(text),
                    "minor" => revision.minor = true,
                    "comment" => revision.comment = Some(text),
                    "model" => revision.model = Some(text),
                    "format" => revision.format = Some(text),
                    TEXT_ELEMENT => {
                        revision.text = text;
                        revision.text_attrs = attrs;
                    }
                    _ => revision.sha1 = Some(text),
                }
            }
            Some(Frame::Contributor) => {
                let revision = current_revision(&mut self.root, self.current_page, self.current_revision)?;
                let contributor = revision.contributor.get_or_insert_with(Contributor::default);
                match name {
                    "username" => contributor.username = Some(text),
                    "id" => contributor.id = Some(text),
                    _ => contributor.ip = Some(text),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn attach(&mut self, element: Element) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Root) => self.root.extra.push(element),
            Some(Frame::Page) => {
                let page = current_page(&mut self.root, self.current_page)?;
                if matches!(element.name.as_str(), "upload" | "logitem") {
                    page.items.push(PageItem::Other(element));
                } else {
                    page.extra.push(element);
                }
            }
            Some(Frame::Revision) => {
                current_revision(&mut self.root, self.current_page, self.current_revision)?
                    .extra
                    .push(element);
            }
            Some(Frame::Contributor) => {
                current_revision(&mut self.root, self.current_page, self.current_revision)?
                    .contributor
                    .get_or_insert_with(Contributor::default)
                    .extra
                    .push(element);
            }
            Some(Frame::Opaque(parent)) => parent.children.push(Node::Element(element)),
            // Markup nested inside a text-valued field is dropped
            Some(Frame::Field { .. }) | None => {}
        }
        Ok(())
    }

    /// The input ran out with elements still open: complete them innermost
    /// first so every hook fires on what was read.
    fn complete_open_nodes(&mut self) -> Result<()> {
        if self.stack.is_empty() {
            return Ok(());
        }
        warn!(
            open_elements = self.stack.len(),
            pages = self.root.pages.len(),
            "Document ended early, completing open elements"
        );
        while !self.stack.is_empty() {
            self.end()?;
        }
        Ok(())
    }
}

impl<L: BuildListener> EventSink for TreeBuilder<L> {
    fn handle(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::Start { name, attrs } => self.start(name, attrs),
            Event::Text(chunk) => {
                self.text(chunk);
                Ok(())
            }
            Event::End { .. } => self.end(),
            Event::EndDocument => self.complete_open_nodes(),
        }
    }
}

fn field(name: &str, attrs: &[Attribute]) -> Frame {
    Frame::Field {
        name: name.to_string(),
        attrs: attrs.to_vec(),
        text: String::new(),
    }
}

fn current_page(root: &mut MediaWiki, serial: Option<u64>) -> Result<&mut Page> {
    let index = serial
        .and_then(|s| root.position_of_page(s))
        .context("Page under construction is missing from the tree")?;
    Ok(&mut root.pages[index])
}

fn current_revision(
    root: &mut MediaWiki,
    page: Option<u64>,
    revision: Option<u64>,
) -> Result<&mut Revision> {
    const MISSING: &str = "Revision under construction is missing from the tree";
    let page = current_page(root, page)?;
    let index = revision
        .and_then(|s| page.position_of_revision(s))
        .context(MISSING)?;
    page.items[index].as_revision_mut().context(MISSING)
}
