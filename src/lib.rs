//! Wikisieve: pull a small, wanted subset out of a MediaWiki XML dump
//!
//! Dumps run to tens of gigabytes, far too large to load as a tree, yet the
//! interesting decisions ("does this page have a Polish section?") need a
//! whole page in hand. Wikisieve combines two passes over one parse:
//!
//! 1. **Pre-filtering** -- Streaming filters rewrite the character data of
//!    `<text>` elements on the fly, before anything is built. They are cheap
//!    but see only the text stream (plus the page title)
//! 2. **Post-filtering** -- The tree builder materializes pages and
//!    revisions one at a time; a listener asks a [`postfilter::PostFilter`]
//!    about each as soon as it is complete and unlinks the rejected ones,
//!    so memory never holds more than the kept pages and one page in flight
//!
//! # Architecture
//!
//! ```text
//! WikiSource ──► prefilter ──► ... ──► TreeBuilder ──► pruned MediaWiki
//!  (quick-xml)   (TextFilter)            │
//!                                        └─ PageFilterListener + PostFilter
//! ```
//!
//! - **Chunk invariance** -- Text arrives in arbitrary slices; every filter
//!   gives the same output however the slices fall
//! - **One-slot deferred deletion** -- A rejected node is removed when its
//!   next sibling starts (or its parent ends), never while it is being built
//! - **Fail fast on wiring, never on data** -- Missing or invalid
//!   configuration is an error before any input is read; odd data
//!   (unbalanced headers, oversized text, absent sections) is handled
//!   locally and the run goes on
//!
//! # Key Modules
//!
//! - [`header`] -- State machine finding `==Name==` headers across chunks
//! - [`prefilter`] -- Stream-filter base ([`prefilter::TextFilter`]) and filter chain
//! - [`language`] -- Keep one language section of each text
//! - [`text_size`] -- Truncate each text to a character limit
//! - [`builder`] -- Incremental typed-tree construction with build hooks
//! - [`listener`] -- Deferred deletion driven by a post-filter
//! - [`postfilter`] -- Stock post-filters (non-empty text, title patterns, ...)
//! - [`pipeline`] -- Source, chain and post-filter wired into one run
//! - [`parser`] -- Streaming XML source with BZ2 decompression
//! - [`writer`] -- Serialize the pruned tree back to XML
//! - [`models`] -- Core data types (MediaWiki, Page, Revision)
//! - [`config`] -- Constants and the JSON pipeline description
//!
//! # Example Usage
//!
//! ```bash
//! # Polish entries of the Polish Wiktionary, oversized texts cut at 500k chars
//! wikisieve language Polish plwiktionary-latest-pages-articles.xml.bz2 \
//!     -o polish.xml --text-size-limit 500000 --text-size-log truncated.log
//!
//! # Inflection templates only
//! wikisieve title plwiktionary-latest-pages-articles.xml.bz2 '^Szablon:odmiana' -o templates.xml
//! ```

pub mod builder;
pub mod config;
pub mod event;
pub mod header;
pub mod language;
pub mod listener;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod postfilter;
pub mod prefilter;
pub mod stats;
pub mod text_size;
pub mod writer;
