use crate::config::{PAGE_ELEMENT, REVISION_ELEMENT, ROOT_ELEMENT, TEXT_ELEMENT, TITLE_ELEMENT};
use crate::event::Attribute;
use crate::models::{Contributor, Element, MediaWiki, Node, Page, PageItem, Revision};
use anyhow::{Context, Result};
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

/// Serializes a tree back to MediaWiki export XML, two-space indented.
/// Character data is written verbatim (escaped), never re-indented.
pub fn write_tree<W: Write>(root: &MediaWiki, out: W) -> Result<()> {
    let mut xml = XmlOut {
        writer: Writer::new_with_indent(out, b' ', 2),
    };
    xml.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    xml.start(ROOT_ELEMENT, &root.attrs)?;
    for element in &root.extra {
        xml.element(element)?;
    }
    for page in &root.pages {
        xml.page(page)?;
    }
    xml.end(ROOT_ELEMENT)?;

    let mut out = xml.writer.into_inner();
    out.write_all(b"\n").context("Failed to write output")?;
    out.flush().context("Failed to flush output")?;
    Ok(())
}

/// Render a tree to a string.
pub fn to_xml_string(root: &MediaWiki) -> Result<String> {
    let mut buf = Vec::new();
    write_tree(root, &mut buf)?;
    String::from_utf8(buf).context("Serialized tree is not valid UTF-8")
}

struct XmlOut<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlOut<W> {
    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .context("Failed to write XML output")?;
        Ok(())
    }

    fn start(&mut self, name: &str, attrs: &[Attribute]) -> Result<()> {
        self.event(Event::Start(open_tag(name, attrs)))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// `<name attrs>text</name>`, or `<name attrs/>` for empty text so
    /// indentation never ends up inside the element.
    fn text_element(&mut self, name: &str, attrs: &[Attribute], text: &str) -> Result<()> {
        if text.is_empty() {
            return self.event(Event::Empty(open_tag(name, attrs)));
        }
        self.start(name, attrs)?;
        self.event(Event::Text(escaped(text)))?;
        self.end(name)
    }

    fn optional(&mut self, name: &str, value: &Option<String>) -> Result<()> {
        match value {
            Some(text) => self.text_element(name, &[], text),
            None => Ok(()),
        }
    }

    fn page(&mut self, page: &Page) -> Result<()> {
        self.start(PAGE_ELEMENT, &[])?;
        self.text_element(TITLE_ELEMENT, &[], &page.title)?;
        self.optional("ns", &page.ns)?;
        self.optional("id", &page.id)?;
        if let Some(target) = &page.redirect {
            self.text_element("redirect", &[Attribute::new("title", target.as_str())], "")?;
        }
        for element in &page.extra {
            self.element(element)?;
        }
        for item in &page.items {
            match item {
                PageItem::Revision(revision) => self.revision(revision)?,
                PageItem::Other(element) => self.element(element)?,
            }
        }
        self.end(PAGE_ELEMENT)
    }

    fn revision(&mut self, revision: &Revision) -> Result<()> {
        self.start(REVISION_ELEMENT, &[])?;
        self.optional("id", &revision.id)?;
        self.optional("parentid", &revision.parent_id)?;
        self.optional("timestamp", &revision.timestamp)?;
        if let Some(contributor) = &revision.contributor {
            self.contributor(contributor)?;
        }
        if revision.minor {
            self.text_element("minor", &[], "")?;
        }
        self.optional("comment", &revision.comment)?;
        self.optional("model", &revision.model)?;
        self.optional("format", &revision.format)?;
        self.text_element(TEXT_ELEMENT, &revision.text_attrs, &revision.text)?;
        self.optional("sha1", &revision.sha1)?;
        for element in &revision.extra {
            self.element(element)?;
        }
        self.end(REVISION_ELEMENT)
    }

    fn contributor(&mut self, contributor: &Contributor) -> Result<()> {
        let empty = contributor.username.is_none()
            && contributor.id.is_none()
            && contributor.ip.is_none()
            && contributor.extra.is_empty();
        if empty {
            return self.text_element("contributor", &contributor.attrs, "");
        }
        self.start("contributor", &contributor.attrs)?;
        self.optional("username", &contributor.username)?;
        self.optional("id", &contributor.id)?;
        self.optional("ip", &contributor.ip)?;
        for element in &contributor.extra {
            self.element(element)?;
        }
        self.end("contributor")
    }

    fn element(&mut self, element: &Element) -> Result<()> {
        if element.children.is_empty() {
            return self.event(Event::Empty(open_tag(&element.name, &element.attrs)));
        }
        self.start(&element.name, &element.attrs)?;
        for child in &element.children {
            match child {
                Node::Element(e) => self.element(e)?,
                Node::Text(t) => self.event(Event::Text(escaped(t)))?,
            }
        }
        self.end(&element.name)
    }
}

/// Escapes only `<`, `>` and `&`; quotes stay readable in text.
fn escaped(text: &str) -> BytesText<'_> {
    BytesText::from_escaped(partial_escape(text))
}

fn open_tag<'a>(name: &'a str, attrs: &'a [Attribute]) -> BytesStart<'a> {
    BytesStart::new(name).with_attributes(attrs.iter().map(|a| (a.name.as_str(), a.value.as_str())))
}
