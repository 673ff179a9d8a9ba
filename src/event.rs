//! Structural events flowing from the XML source through the filter chain
//! into the tree builder.

use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One event of a depth-first document traversal.
///
/// `Text` carries an arbitrary slice of an element's character data: the
/// content of a single element may arrive split across any number of
/// `Text` events, with no guarantee about where the splits fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    Start {
        name: &'a str,
        attrs: &'a [Attribute],
    },
    Text(&'a str),
    End {
        name: &'a str,
    },
    /// The source is exhausted. No events follow.
    EndDocument,
}

/// Receiver of an event stream.
pub trait EventSink {
    fn handle(&mut self, event: Event<'_>) -> Result<()>;

    /// Forward character data, dropping empty slices.
    fn characters(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.handle(Event::Text(text))
    }
}

/// One link of the filter chain: consumes an event and forwards whatever it
/// wants the rest of the chain to see into `out`.
pub trait EventFilter {
    fn filter(&mut self, event: Event<'_>, out: &mut dyn EventSink) -> Result<()>;
}

/// Collects events as owned values. Handy as the tail of a chain in tests
/// and when inspecting what a filter emits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recorder {
    pub events: Vec<OwnedEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedEvent {
    Start { name: String, attrs: Vec<Attribute> },
    Text(String),
    End { name: String },
    EndDocument,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenation of all character data inside elements named `element`.
    pub fn text_of(&self, element: &str) -> String {
        let mut depth = 0usize;
        let mut out = String::new();
        for event in &self.events {
            match event {
                OwnedEvent::Start { name, .. } if name == element => depth += 1,
                OwnedEvent::End { name } if name == element => depth = depth.saturating_sub(1),
                OwnedEvent::Text(text) if depth > 0 => out.push_str(text),
                _ => {}
            }
        }
        out
    }
}

impl EventSink for Recorder {
    fn handle(&mut self, event: Event<'_>) -> Result<()> {
        let owned = match event {
            Event::Start { name, attrs } => OwnedEvent::Start {
                name: name.to_string(),
                attrs: attrs.to_vec(),
            },
            Event::Text(text) => OwnedEvent::Text(text.to_string()),
            Event::End { name } => OwnedEvent::End {
                name: name.to_string(),
            },
            Event::EndDocument => OwnedEvent::EndDocument,
        };
        self.events.push(owned);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn characters_drops_empty_slices() {
        let mut rec = Recorder::new();
        rec.characters("").unwrap();
        rec.characters("abc").unwrap();
        assert_eq!(rec.events, vec![OwnedEvent::Text("abc".to_string())]);
    }

    #[test]
    fn text_of_only_collects_inside_element() {
        let mut rec = Recorder::new();
        rec.handle(Event::Text("outside")).unwrap();
        rec.handle(Event::Start {
            name: "text",
            attrs: &[],
        })
        .unwrap();
        rec.handle(Event::Text("in")).unwrap();
        rec.handle(Event::Text("side")).unwrap();
        rec.handle(Event::End { name: "text" }).unwrap();
        rec.handle(Event::Text("after")).unwrap();
        assert_eq!(rec.text_of("text"), "inside");
    }
}
