//! Wires a source, the pre-filters, and a post-filter into one pass:
//!
//! ```text
//! WikiSource -> filter[0] -> ... -> filter[N-1] -> TreeBuilder + PageFilterListener
//! ```

use crate::builder::TreeBuilder;
use crate::config::{PostFilterSpec, PrefilterSpec, SieveConfig};
use crate::event::EventFilter;
use crate::language::LanguagePrefilter;
use crate::listener::PageFilterListener;
use crate::models::MediaWiki;
use crate::parser::WikiSource;
use crate::postfilter::{KeepAll, KeepNone, NonEmptyText, PostFilter, TitlePatterns};
use crate::prefilter::{Chain, TextFilter, TextFilterStage};
use crate::stats::FilterStats;
use crate::text_size::{TextSizeLimit, TextSizePrefilter};
use anyhow::{Context, Result};
use std::io::BufRead;
use std::time::Instant;
use tracing::info;

/// The pruned tree and what it took to get there.
#[derive(Debug)]
pub struct Loaded {
    pub root: MediaWiki,
    pub stats: FilterStats,
}

pub struct PipelineBuilder<R> {
    source: Option<WikiSource<R>>,
    filters: Vec<Box<dyn EventFilter>>,
    post_filter: Option<Box<dyn PostFilter>>,
    progress: bool,
}

impl<R: BufRead> Default for PipelineBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead> PipelineBuilder<R> {
    pub fn new() -> Self {
        Self {
            source: None,
            filters: Vec::new(),
            post_filter: None,
            progress: false,
        }
    }

    /// A builder set up as `config` describes. The source is still to be
    /// supplied.
    pub fn from_config(config: &SieveConfig) -> Result<Self> {
        let mut builder = Self::new();
        for spec in &config.prefilters {
            builder = match spec {
                PrefilterSpec::Language { name, loose: false } => {
                    builder.text_filter(LanguagePrefilter::new(name)?)
                }
                PrefilterSpec::Language { name, loose: true } => {
                    builder.text_filter(LanguagePrefilter::loose(name)?)
                }
                PrefilterSpec::TextSize { limit } => {
                    builder.text_filter(TextSizePrefilter::new(TextSizeLimit::from_raw(*limit)?))
                }
            };
        }
        let post = config
            .post_filter
            .as_ref()
            .context("Pipeline config has no post_filter")?;
        builder = match post {
            PostFilterSpec::KeepAll => builder.post_filter(KeepAll),
            PostFilterSpec::KeepNone => builder.post_filter(KeepNone),
            PostFilterSpec::NonEmptyText => builder.post_filter(NonEmptyText),
            PostFilterSpec::Title { patterns } => builder.post_filter(TitlePatterns::new(patterns)?),
        };
        Ok(builder)
    }

    pub fn source(mut self, source: WikiSource<R>) -> Self {
        self.source = Some(source);
        self
    }

    /// Append a stage to the end of the filter chain.
    pub fn filter(mut self, filter: impl EventFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn text_filter(self, filter: impl TextFilter + 'static) -> Self {
        self.filter(TextFilterStage::new(filter))
    }

    pub fn post_filter(mut self, filter: impl PostFilter + 'static) -> Self {
        self.post_filter = Some(Box::new(filter));
        self
    }

    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn build(self) -> Result<Pipeline<R>> {
        let source = self.source.context("No input source configured")?;
        let post_filter = self.post_filter.context("No post filter configured")?;
        let mut listener = PageFilterListener::new(post_filter);
        if self.progress {
            listener = listener.with_progress();
        }
        Ok(Pipeline {
            source,
            filters: self.filters,
            listener,
        })
    }
}

pub struct Pipeline<R> {
    source: WikiSource<R>,
    filters: Vec<Box<dyn EventFilter>>,
    listener: PageFilterListener<Box<dyn PostFilter>>,
}

impl<R: BufRead> Pipeline<R> {
    pub fn run(mut self) -> Result<Loaded> {
        let start = Instant::now();
        info!(prefilters = self.filters.len(), "Begin parse");

        let mut builder = TreeBuilder::new(self.listener);
        {
            let mut chain = Chain::new(&mut self.filters, &mut builder);
            self.source.run(&mut chain).context("Failed to parse wiki dump")?;
        }
        let (root, listener) = builder.finish()?;
        let stats = listener.stats();

        info!(
            pages = root.pages.len(),
            revisions = root.revision_count(),
            pages_seen = stats.pages_seen,
            revisions_seen = stats.revisions_seen,
            duration_secs = start.elapsed().as_secs_f64(),
            "Parse complete"
        );
        Ok(Loaded { root, stats })
    }
}
