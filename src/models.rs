use crate::event::Attribute;

/// Element with no typed counterpart (`<siteinfo>`, `<upload>`, unknown
/// additions to the schema), kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn new(name: impl Into<String>, attrs: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attrs,
            children: Vec::new(),
        }
    }

    /// Append character data, merging with a preceding text child.
    pub fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// All character data below this element, in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(&e.children, out),
        }
    }
}

/// Root of a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaWiki {
    pub attrs: Vec<Attribute>,
    /// Non-page children, `<siteinfo>` in practice
    pub extra: Vec<Element>,
    pub pages: Vec<Page>,
}

impl MediaWiki {
    pub fn revision_count(&self) -> usize {
        self.pages.iter().map(|p| p.revisions().count()).sum()
    }

    pub(crate) fn position_of_page(&self, serial: u64) -> Option<usize> {
        self.pages.iter().rposition(|p| p.serial == serial)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Builder-assigned identity, unique within one parse
    pub serial: u64,
    pub title: String,
    pub ns: Option<String>,
    pub id: Option<String>,
    /// Target of `<redirect title="..."/>`
    pub redirect: Option<String>,
    pub items: Vec<PageItem>,
    /// Other children (`<restrictions>`, `<discussionthreadinginfo>`, ...)
    pub extra: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageItem {
    Revision(Revision),
    /// `<upload>` or `<logitem>`
    Other(Element),
}

impl PageItem {
    pub fn as_revision(&self) -> Option<&Revision> {
        match self {
            PageItem::Revision(r) => Some(r),
            PageItem::Other(_) => None,
        }
    }

    pub fn as_revision_mut(&mut self) -> Option<&mut Revision> {
        match self {
            PageItem::Revision(r) => Some(r),
            PageItem::Other(_) => None,
        }
    }

    fn serial(&self) -> Option<u64> {
        self.as_revision().map(|r| r.serial)
    }
}

impl Page {
    pub fn revisions(&self) -> impl Iterator<Item = &Revision> {
        self.items.iter().filter_map(PageItem::as_revision)
    }

    /// Characters of text across all revisions.
    pub fn text_size(&self) -> usize {
        self.revisions().map(Revision::text_size).sum()
    }

    /// The numeric page id, when present and well-formed.
    pub fn id_number(&self) -> Option<u64> {
        self.id.as_deref().and_then(|s| s.trim().parse().ok())
    }

    pub(crate) fn position_of_revision(&self, serial: u64) -> Option<usize> {
        self.items.iter().rposition(|item| item.serial() == Some(serial))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Revision {
    pub serial: u64,
    pub id: Option<String>,
    pub parent_id: Option<String>,
    pub timestamp: Option<String>,
    pub contributor: Option<Contributor>,
    pub minor: bool,
    pub comment: Option<String>,
    pub model: Option<String>,
    pub format: Option<String>,
    pub text: String,
    pub text_attrs: Vec<Attribute>,
    pub sha1: Option<String>,
    pub extra: Vec<Element>,
}

impl Revision {
    pub fn text_size(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contributor {
    pub attrs: Vec<Attribute>,
    pub username: Option<String>,
    pub id: Option<String>,
    pub ip: Option<String>,
    pub extra: Vec<Element>,
}
