//! Prunes the tree while it is being built.
//!
//! A rejected node cannot be unlinked the moment it completes, so it is
//! parked in a one-slot "pending" handle and removed when the next node of
//! its kind is about to be created or, for the last one, when its parent
//! completes. The parse only ever has one page and one revision in flight,
//! so a single slot per level is enough and peak memory stays at one page.

use crate::builder::{BuildListener, Completed, Creating};
use crate::config::PROGRESS_INTERVAL;
use crate::models::{MediaWiki, Page};
use crate::postfilter::PostFilter;
use crate::stats::FilterStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, trace};

pub struct PageFilterListener<P> {
    filter: P,
    pending_page: Option<u64>,
    pending_revision: Option<u64>,
    stats: FilterStats,
    progress: Option<ProgressBar>,
}

impl<P: PostFilter> PageFilterListener<P> {
    pub fn new(filter: P) -> Self {
        Self {
            filter,
            pending_page: None,
            pending_revision: None,
            stats: FilterStats::new(),
            progress: None,
        }
    }

    /// Show a spinner with kept/seen page counts.
    pub fn with_progress(mut self) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Filtering pages ...");
        self.progress = Some(pb);
        self
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    fn defer_page(&mut self, serial: u64) {
        assert!(
            self.pending_page.is_none(),
            "a second page was rejected before the first was removed"
        );
        self.pending_page = Some(serial);
    }

    fn defer_revision(&mut self, serial: u64) {
        assert!(
            self.pending_revision.is_none(),
            "a second revision was rejected before the first was removed"
        );
        self.pending_revision = Some(serial);
    }

    fn flush_page(&mut self, root: &mut MediaWiki) {
        if let Some(serial) = self.pending_page.take() {
            let index = root
                .position_of_page(serial)
                .unwrap_or_else(|| panic!("rejected page #{} is not among the root's pages", serial));
            root.pages.remove(index);
        }
    }

    fn flush_revision(&mut self, page: &mut Page) {
        if let Some(serial) = self.pending_revision.take() {
            let index = page.position_of_revision(serial).unwrap_or_else(|| {
                panic!(
                    "rejected revision #{} is not among the items of page {:?}",
                    serial, page.title
                )
            });
            page.items.remove(index);
        }
    }

    fn page_complete(&mut self, root: &mut MediaWiki, index: usize) {
        // The page's last revision has no successor to trigger its removal
        self.flush_revision(&mut root.pages[index]);

        let page = &root.pages[index];
        let keep = self.filter.keep_page(page);
        self.stats.record_page(keep);
        let label = if keep { "kept page" } else { "dumped page" };
        debug!(
            "{:<11} {:>5} {:>7} {:>30} {}",
            label,
            self.stats.pages_kept,
            self.stats.pages_seen,
            page.title,
            page.text_size()
        );
        if !keep {
            let serial = page.serial;
            self.defer_page(serial);
        }

        if let Some(pb) = &self.progress {
            if self.stats.pages_seen % PROGRESS_INTERVAL == 0 {
                pb.set_message(format!(
                    "{} of {} pages kept",
                    self.stats.pages_kept, self.stats.pages_seen
                ));
                pb.tick();
            }
        }
    }

    fn revision_complete(&mut self, page: &mut Page, index: usize) {
        let Some(revision) = page.items[index].as_revision() else {
            return;
        };
        let keep = self.filter.keep_revision(revision, page);
        self.stats.record_revision(keep);
        let label = if keep { "kept rev." } else { "dumped rev." };
        trace!(
            "    {:<11} {:>5} {:>7} {:>12} {}",
            label,
            self.stats.revisions_kept,
            self.stats.revisions_seen,
            revision.id.as_deref().unwrap_or_default(),
            revision.text_size()
        );
        if !keep {
            let serial = revision.serial;
            self.defer_revision(serial);
        }
    }
}

impl<P: PostFilter> BuildListener for PageFilterListener<P> {
    fn node_will_be_created(&mut self, node: Creating<'_>) {
        match node {
            Creating::Page { root } => self.flush_page(root),
            Creating::Revision { page } => self.flush_revision(page),
        }
    }

    fn node_complete(&mut self, node: Completed<'_>) {
        match node {
            Completed::Revision { page, index } => self.revision_complete(page, index),
            Completed::Page { root, index } => self.page_complete(root, index),
            Completed::Root { root } => {
                self.flush_page(root);
                if let Some(pb) = &self.progress {
                    pb.finish_and_clear();
                }
            }
        }
    }
}
