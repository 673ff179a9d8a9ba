use crate::config::{BZ2_SUFFIX, DEFAULT_CHUNK_SIZE, STDIO_PATH};
use crate::event::{Attribute, Event, EventSink};
use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::debug;

/// Streams a MediaWiki dump as [`Event`]s.
///
/// Character data is handed on in slices of at most `chunk_size` bytes (cut
/// on char boundaries), so downstream filters see the same arbitrary
/// splitting a SAX parser would give them and never hold a whole
/// multi-megabyte text node in one call.
pub struct WikiSource<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    chunk_size: usize,
}

impl WikiSource<Box<dyn BufRead>> {
    /// Open a dump file (`-` for stdin, `.bz2` decompressed on the fly).
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::new(open_input(path)?))
    }
}

impl<R: BufRead> WikiSource<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(false);
        reader.expand_empty_elements(true);
        Self {
            reader,
            buf: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Largest text slice per event, in bytes. A slice always holds at
    /// least one character.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Push the whole document into `sink`, ending with
    /// [`Event::EndDocument`].
    pub fn run<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        loop {
            self.buf.clear();
            let position = self.reader.buffer_position();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| format!("Failed to read XML near byte {}", position))?;
            match event {
                XmlEvent::Start(e) => {
                    let local = e.local_name();
                    let name = element_name(local.as_ref())?;
                    let attrs = attributes(&e)?;
                    sink.handle(Event::Start {
                        name,
                        attrs: &attrs,
                    })?;
                }
                XmlEvent::End(e) => {
                    let local = e.local_name();
                    let name = element_name(local.as_ref())?;
                    sink.handle(Event::End { name })?;
                }
                XmlEvent::Text(e) => {
                    let text = e
                        .unescape()
                        .with_context(|| format!("Bad character data near byte {}", position))?;
                    emit_chunked(sink, &text, self.chunk_size)?;
                }
                XmlEvent::CData(e) => {
                    let text = std::str::from_utf8(&e).context("CDATA is not valid UTF-8")?;
                    emit_chunked(sink, text, self.chunk_size)?;
                }
                XmlEvent::Eof => {
                    debug!(bytes = self.reader.buffer_position(), "End of input");
                    return sink.handle(Event::EndDocument);
                }
                // Expanded into Start + End by the reader
                XmlEvent::Empty(_) => {}
                XmlEvent::Comment(_) | XmlEvent::Decl(_) | XmlEvent::PI(_) | XmlEvent::DocType(_) => {}
            }
        }
    }
}

fn element_name(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).context("Element name is not valid UTF-8")
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<Attribute>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.context("Malformed attribute")?;
        let name = std::str::from_utf8(attr.key.as_ref()).context("Attribute name is not valid UTF-8")?;
        let value = attr
            .unescape_value()
            .with_context(|| format!("Bad value for attribute {}", name))?;
        attrs.push(Attribute::new(name, value));
    }
    Ok(attrs)
}

fn emit_chunked<S: EventSink + ?Sized>(sink: &mut S, text: &str, chunk_size: usize) -> Result<()> {
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = chunk_size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        sink.characters(head)?;
        rest = tail;
    }
    Ok(())
}

/// Open `path` for reading: `-` is stdin, a `.bz2` suffix is decompressed
/// (multi-stream, as the dumps are), anything else is read as plain XML.
pub fn open_input(path: &str) -> Result<Box<dyn BufRead>> {
    if path == STDIO_PATH {
        return Ok(Box::new(BufReader::new(io::stdin().lock())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open wiki dump at: {}", path))?;
    if path.ends_with(BZ2_SUFFIX) {
        Ok(Box::new(BufReader::new(MultiBzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
