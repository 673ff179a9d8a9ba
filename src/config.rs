use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Character that opens and closes a section header
pub const HEADER_MARKER: char = '=';

/// Marker run length of a searchable header (`==Name==`)
pub const HEADER_LEVEL: usize = 2;

pub const ROOT_ELEMENT: &str = "mediawiki";

/// Element whose character data the pre-filters transform
pub const TEXT_ELEMENT: &str = "text";

/// Element holding the page title
pub const TITLE_ELEMENT: &str = "title";

pub const PAGE_ELEMENT: &str = "page";

pub const REVISION_ELEMENT: &str = "revision";

/// Largest text slice handed to the filter chain in one call (bytes)
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Progress update interval (tick every N completed pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

/// Tracing target for text-size truncation records
pub const TRUNCATION_TARGET: &str = "wikisieve::truncation";

/// Path meaning stdin for input and stdout for output
pub const STDIO_PATH: &str = "-";

pub const BZ2_SUFFIX: &str = ".bz2";

/// Default text size limit for title extraction, where vandalized pages can run to gigabytes
pub const TITLE_TEXT_SIZE_LIMIT: i64 = 1_000_000;

/// On-disk pipeline description, loaded from JSON.
///
/// ```json
/// {
///   "prefilters": [
///     { "kind": "language", "name": "Polish", "loose": true },
///     { "kind": "text_size", "limit": 500000 }
///   ],
///   "post_filter": { "kind": "non_empty_text" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SieveConfig {
    #[serde(default)]
    pub prefilters: Vec<PrefilterSpec>,
    pub post_filter: Option<PostFilterSpec>,
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrefilterSpec {
    Language {
        name: String,
        #[serde(default)]
        loose: bool,
    },
    TextSize {
        limit: i64,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostFilterSpec {
    KeepAll,
    KeepNone,
    NonEmptyText,
    Title { patterns: Vec<String> },
}

impl SieveConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid pipeline config")
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config: {}", path))?;
        Self::from_json(&json).with_context(|| format!("In {}", path))
    }
}
