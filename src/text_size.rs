use crate::config::TRUNCATION_TARGET;
use crate::event::EventSink;
use crate::prefilter::{TextContext, TextFilter};
use anyhow::{bail, Context, Result};
use std::fmt;
use std::io::Write;
use tracing::info;

/// Maximum number of characters kept per `<text>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSizeLimit {
    Unlimited,
    Chars(usize),
}

impl TextSizeLimit {
    /// Raw value meaning "no limit", for command lines and config files.
    /// Applications that may or may not limit text keep the filter in the
    /// chain with this value rather than removing it.
    pub const UNLIMITED: i64 = -1;

    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            Self::UNLIMITED => Ok(Self::Unlimited),
            n if n < 0 => bail!(
                "text size limit must be {} (unlimited) or >= 0, got {}",
                Self::UNLIMITED,
                n
            ),
            n => Ok(Self::Chars(
                usize::try_from(n).context("text size limit does not fit in memory")?,
            )),
        }
    }

    fn as_chars(self) -> usize {
        match self {
            Self::Unlimited => usize::MAX,
            Self::Chars(n) => n,
        }
    }
}

impl fmt::Display for TextSizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "{}", Self::UNLIMITED),
            Self::Chars(n) => write!(f, "{}", n),
        }
    }
}

/// Pre-filter truncating each `<text>` element to a fixed number of characters.
///
/// Some pages have been vandalized with gigabytes of junk; this keeps them
/// from reaching the tree. Each truncated element yields one record
/// `{actual size} {limit} {title}` on the truncation log.
pub struct TextSizePrefilter {
    limit: TextSizeLimit,
    current_size: usize,
    truncated: u64,
    log: Option<Box<dyn Write>>,
}

impl TextSizePrefilter {
    pub fn new(limit: TextSizeLimit) -> Self {
        Self {
            limit,
            current_size: 0,
            truncated: 0,
            log: None,
        }
    }

    /// Also write truncation records, one per line, to `log`.
    pub fn with_log(mut self, log: impl Write + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }

    /// Characters seen so far in the current element, including dropped ones.
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn truncated(&self) -> u64 {
        self.truncated
    }
}

impl TextFilter for TextSizePrefilter {
    fn start_text(&mut self, _ctx: &TextContext<'_>) {
        self.current_size = 0;
    }

    fn text(&mut self, chunk: &str, _ctx: &TextContext<'_>, out: &mut dyn EventSink) -> Result<()> {
        let limit = self.limit.as_chars();
        let before = self.current_size;
        self.current_size = before.saturating_add(chunk.chars().count());

        if before >= limit {
            Ok(())
        } else if self.current_size > limit {
            let using = limit - before;
            let cut = chunk
                .char_indices()
                .nth(using)
                .map_or(chunk.len(), |(i, _)| i);
            out.characters(&chunk[..cut])
        } else {
            out.characters(chunk)
        }
    }

    fn end_text(&mut self, ctx: &TextContext<'_>, _out: &mut dyn EventSink) -> Result<()> {
        if self.current_size <= self.limit.as_chars() {
            return Ok(());
        }
        self.truncated += 1;
        let title = ctx.title.unwrap_or_default();
        info!(
            target: TRUNCATION_TARGET,
            "{} {} {}", self.current_size, self.limit, title
        );
        if let Some(log) = self.log.as_mut() {
            writeln!(log, "{} {} {}", self.current_size, self.limit, title)
                .context("Failed to write truncation log")?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        if let Some(log) = self.log.as_mut() {
            log.flush().context("Failed to flush truncation log")?;
        }
        Ok(())
    }
}
