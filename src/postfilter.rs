//! Decisions over fully built pages and revisions.
//!
//! A post-filter sees whole nodes, so it can use any context the tree gives
//! it, but it runs after the node is in memory. Pair it with pre-filters
//! that shrink what gets built.

use crate::models::{Page, Revision};
use anyhow::{Context, Result};
use regex::RegexSet;

pub trait PostFilter {
    /// Called once per page, after all of its revisions were decided.
    fn keep_page(&mut self, page: &Page) -> bool;

    /// Called once per revision. `page` is the enclosing page, populated up
    /// to (and including) this revision.
    fn keep_revision(&mut self, revision: &Revision, page: &Page) -> bool;
}

impl<P: PostFilter + ?Sized> PostFilter for Box<P> {
    fn keep_page(&mut self, page: &Page) -> bool {
        (**self).keep_page(page)
    }

    fn keep_revision(&mut self, revision: &Revision, page: &Page) -> bool {
        (**self).keep_revision(revision, page)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl PostFilter for KeepAll {
    fn keep_page(&mut self, _page: &Page) -> bool {
        true
    }

    fn keep_revision(&mut self, _revision: &Revision, _page: &Page) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeepNone;

impl PostFilter for KeepNone {
    fn keep_page(&mut self, _page: &Page) -> bool {
        false
    }

    fn keep_revision(&mut self, _revision: &Revision, _page: &Page) -> bool {
        false
    }
}

/// Keeps revisions with any text left, and pages with at least one such
/// revision.
///
/// Meant to follow a [`LanguagePrefilter`](crate::language::LanguagePrefilter):
/// text that survived the pre-filter starts with the wanted section header,
/// so "non-empty" already means "has the section".
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyText;

impl PostFilter for NonEmptyText {
    fn keep_page(&mut self, page: &Page) -> bool {
        page.text_size() > 0
    }

    fn keep_revision(&mut self, revision: &Revision, _page: &Page) -> bool {
        !revision.text.is_empty()
    }
}

/// Keeps pages whose title matches any of a set of regular expressions
/// (unanchored search), along with all of their revisions.
#[derive(Debug, Clone)]
pub struct TitlePatterns {
    patterns: RegexSet,
    // (page serial, decision) for the page being read
    last: Option<(u64, bool)>,
}

impl TitlePatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSet::new(patterns).context("Invalid title pattern")?;
        Ok(Self {
            patterns,
            last: None,
        })
    }

    fn decide(&mut self, page: &Page) -> bool {
        match self.last {
            Some((serial, keep)) if serial == page.serial => keep,
            _ => {
                let keep = self.patterns.is_match(&page.title);
                self.last = Some((page.serial, keep));
                keep
            }
        }
    }
}

impl PostFilter for TitlePatterns {
    fn keep_page(&mut self, page: &Page) -> bool {
        self.decide(page)
    }

    fn keep_revision(&mut self, _revision: &Revision, page: &Page) -> bool {
        self.decide(page)
    }
}

/// A post-filter made of two closures.
pub struct Predicates<P, R> {
    page: P,
    revision: R,
}

impl<P, R> Predicates<P, R>
where
    P: FnMut(&Page) -> bool,
    R: FnMut(&Revision, &Page) -> bool,
{
    pub fn new(page: P, revision: R) -> Self {
        Self { page, revision }
    }
}

impl<P, R> PostFilter for Predicates<P, R>
where
    P: FnMut(&Page) -> bool,
    R: FnMut(&Revision, &Page) -> bool,
{
    fn keep_page(&mut self, page: &Page) -> bool {
        (self.page)(page)
    }

    fn keep_revision(&mut self, revision: &Revision, page: &Page) -> bool {
        (self.revision)(revision, page)
    }
}
