//! Base for streaming filters that rewrite only the character data of
//! `<text>` elements.
//!
//! [`TextFilterStage`] wraps a [`TextFilter`] and handles the event dispatch:
//! every start and end event passes through unchanged (including those of
//! `<text>` itself), character data outside `<text>` passes through, and
//! character data inside `<text>` goes to the filter, which decides what to
//! forward. The characters of one `<text>` element arrive split across any
//! number of calls; filters must not assume a call holds whole lines or words.

use crate::config::{PAGE_ELEMENT, TEXT_ELEMENT, TITLE_ELEMENT};
use crate::event::{Event, EventFilter, EventSink};
use anyhow::Result;

/// What a text filter knows about the element it is filtering.
#[derive(Debug, Clone, Copy)]
pub struct TextContext<'a> {
    /// Title of the enclosing page, once its `<title>` has been read
    pub title: Option<&'a str>,
}

pub trait TextFilter {
    /// A `<text>` element begins. Reset per-element state here.
    fn start_text(&mut self, ctx: &TextContext<'_>);

    /// A slice of the current `<text>` element's characters. Forward the
    /// (possibly transformed) characters with `out.characters`.
    fn text(&mut self, chunk: &str, ctx: &TextContext<'_>, out: &mut dyn EventSink) -> Result<()>;

    /// The current `<text>` element is complete. Anything still held back
    /// must be forwarded or dropped now.
    fn end_text(&mut self, ctx: &TextContext<'_>, out: &mut dyn EventSink) -> Result<()>;

    /// The input is exhausted. Release any resources that buffer output.
    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Adapts a [`TextFilter`] into a link of the filter chain.
pub struct TextFilterStage<F> {
    filter: F,
    in_text: bool,
    in_title: bool,
    title: Option<String>,
}

impl<F: TextFilter> TextFilterStage<F> {
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            in_text: false,
            in_title: false,
            title: None,
        }
    }

    pub fn inner(&self) -> &F {
        &self.filter
    }

    pub fn current_title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn in_text(&self) -> bool {
        self.in_text
    }

    pub fn in_title(&self) -> bool {
        self.in_title
    }

    fn close_text(&mut self, out: &mut dyn EventSink) -> Result<()> {
        self.in_text = false;
        let ctx = TextContext {
            title: self.title.as_deref(),
        };
        self.filter.end_text(&ctx, out)
    }
}

impl<F: TextFilter> EventFilter for TextFilterStage<F> {
    fn filter(&mut self, event: Event<'_>, out: &mut dyn EventSink) -> Result<()> {
        match event {
            Event::Start { name, .. } => {
                debug_assert!(!self.in_text, "no element may nest inside <text>");
                if name == TEXT_ELEMENT {
                    self.in_text = true;
                    let ctx = TextContext {
                        title: self.title.as_deref(),
                    };
                    self.filter.start_text(&ctx);
                } else if name == TITLE_ELEMENT {
                    self.in_title = true;
                    self.title = Some(String::new());
                }
                out.handle(event)
            }
            Event::Text(chunk) => {
                if self.in_title {
                    if let Some(title) = self.title.as_mut() {
                        title.push_str(chunk);
                    }
                }
                if self.in_text {
                    let ctx = TextContext {
                        title: self.title.as_deref(),
                    };
                    self.filter.text(chunk, &ctx, out)
                } else {
                    out.handle(event)
                }
            }
            Event::End { name } => {
                if name == TEXT_ELEMENT {
                    debug_assert!(self.in_text, "</text> without <text>");
                    self.close_text(out)?;
                } else if name == TITLE_ELEMENT {
                    self.in_title = false;
                } else if name == PAGE_ELEMENT {
                    self.title = None;
                }
                out.handle(event)
            }
            Event::EndDocument => {
                if self.in_text {
                    self.close_text(out)?;
                }
                self.filter.end_document()?;
                out.handle(event)
            }
        }
    }
}

/// The filters in front of a final sink, as one [`EventSink`].
///
/// `stages[0]` sees the raw events; each stage's output feeds the next, and
/// the last stage's output reaches `sink`.
pub struct Chain<'a, S: EventSink + ?Sized> {
    stages: &'a mut [Box<dyn EventFilter>],
    sink: &'a mut S,
}

impl<'a, S: EventSink + ?Sized> Chain<'a, S> {
    pub fn new(stages: &'a mut [Box<dyn EventFilter>], sink: &'a mut S) -> Self {
        Self { stages, sink }
    }
}

impl<S: EventSink + ?Sized> EventSink for Chain<'_, S> {
    fn handle(&mut self, event: Event<'_>) -> Result<()> {
        match self.stages.split_first_mut() {
            None => self.sink.handle(event),
            Some((first, rest)) => {
                let mut downstream = Chain {
                    stages: rest,
                    sink: &mut *self.sink,
                };
                first.filter(event, &mut downstream)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::event::{Attribute, OwnedEvent, Recorder};

    /// Drive a bare text filter through one `<text>` element, one call per
    /// chunk, and return everything it forwarded.
    pub fn run_text<F: TextFilter>(filter: &mut F, chunks: &[&str]) -> String {
        run_text_titled(filter, None, chunks)
    }

    pub fn run_text_titled<F: TextFilter>(
        filter: &mut F,
        title: Option<&str>,
        chunks: &[&str],
    ) -> String {
        let mut rec = Recorder::new();
        let ctx = TextContext { title };
        filter.start_text(&ctx);
        for chunk in chunks {
            filter.text(chunk, &ctx, &mut rec).unwrap();
        }
        filter.end_text(&ctx, &mut rec).unwrap();
        rec.events
            .iter()
            .map(|e| match e {
                OwnedEvent::Text(t) => t.as_str(),
                other => panic!("text filter emitted {:?}", other),
            })
            .collect()
    }

    /// Split `s` into pieces of the given byte sizes (cycled), rounded up to
    /// char boundaries.
    pub fn chunked<'s>(s: &'s str, sizes: &[usize]) -> Vec<&'s str> {
        let mut pieces = Vec::new();
        let mut start = 0;
        let mut idx = 0;
        while start < s.len() {
            let mut end = (start + sizes[idx % sizes.len()]).min(s.len());
            while !s.is_char_boundary(end) {
                end += 1;
            }
            pieces.push(&s[start..end]);
            start = end;
            idx += 1;
        }
        pieces
    }

    pub fn start<'a>(name: &'a str) -> Event<'a> {
        const NO_ATTRS: &[Attribute] = &[];
        Event::Start {
            name,
            attrs: NO_ATTRS,
        }
    }

    pub fn end(name: &str) -> Event<'_> {
        Event::End { name }
    }
}
