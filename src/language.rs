//! Pre-filter that keeps only one language section of each `<text>` element.
//!
//! Output for a text element is the target header followed by the section
//! body, up to but not including the next level-2 header. Text before the
//! target header is dropped, as is everything from the next header onward.
//! Elements without the target section come out empty, which lets a
//! post-filter such as [`crate::postfilter::NonEmptyText`] prune them.

use crate::event::EventSink;
use crate::header::{wrap_header, HeaderSearch};
use crate::prefilter::{TextContext, TextFilter};
use anyhow::{ensure, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Decides whether a header's content names the wanted section.
pub trait HeaderMatcher {
    fn matches(&self, content: &str) -> bool;
}

impl<F: Fn(&str) -> bool> HeaderMatcher for F {
    fn matches(&self, content: &str) -> bool {
        self(content)
    }
}

/// Matches header content exactly: `==Polish==` but not `== Polish ==`.
#[derive(Debug, Clone)]
pub struct ExactName(pub String);

impl HeaderMatcher for ExactName {
    fn matches(&self, content: &str) -> bool {
        content == self.0
    }
}

static LINKED_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\[(.*)\]\]$").unwrap());

/// Tolerates surrounding whitespace and a wiki-link wrap, so `Polish`,
/// ` Polish `, `[[Polish]]` and ` [[ Polish ]] ` all match `Polish`.
/// Comparison stays case-sensitive.
#[derive(Debug, Clone)]
pub struct LooseName(pub String);

impl LooseName {
    pub fn normalize(content: &str) -> &str {
        let trimmed = content.trim();
        match LINKED_NAME.captures(trimmed).and_then(|c| c.get(1)) {
            Some(inner) => inner.as_str().trim(),
            None => trimmed,
        }
    }
}

impl HeaderMatcher for LooseName {
    fn matches(&self, content: &str) -> bool {
        Self::normalize(content) == self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionStage {
    Pre,
    In,
    Post,
}

pub struct LanguagePrefilter<M = ExactName> {
    matcher: M,
    stage: SectionStage,
    search: HeaderSearch,
    // section text withheld because it may be the start of the next header
    held: String,
}

impl LanguagePrefilter<ExactName> {
    pub fn new(language: &str) -> Result<Self> {
        ensure!(!language.is_empty(), "language name must not be empty");
        Ok(Self::with_matcher(ExactName(language.to_string())))
    }
}

impl LanguagePrefilter<LooseName> {
    pub fn loose(language: &str) -> Result<Self> {
        let name = LooseName::normalize(language);
        ensure!(!name.is_empty(), "language name must not be empty");
        Ok(Self::with_matcher(LooseName(name.to_string())))
    }
}

impl<M: HeaderMatcher> LanguagePrefilter<M> {
    pub fn with_matcher(matcher: M) -> Self {
        Self {
            matcher,
            stage: SectionStage::Pre,
            search: HeaderSearch::new(),
            held: String::new(),
        }
    }

    /// Look for the target header; on finding it, emit it and continue
    /// with the rest of the chunk as section body.
    fn seek_section(&mut self, chunk: &str, out: &mut dyn EventSink) -> Result<()> {
        let mut rest = chunk;
        while let Some(found) = self.search.process(rest) {
            self.search = HeaderSearch::new();
            rest = &rest[found.next..];
            if self.matcher.matches(&found.content) {
                self.stage = SectionStage::In;
                out.characters(&found.full_header())?;
                return self.scan_section(rest, out);
            }
        }
        Ok(())
    }

    /// Forward section body until the next level-2 header.
    ///
    /// Text that might begin a header is held back until the search
    /// resolves it: a balanced header ends the section and is dropped, an
    /// aborted or unbalanced one is released verbatim.
    fn scan_section(&mut self, chunk: &str, out: &mut dyn EventSink) -> Result<()> {
        match self.search.process(chunk) {
            Some(found) => {
                let consumed = &chunk[..found.next];
                self.release_all_but(consumed, found.len, out)?;
                self.held.clear();
                self.stage = SectionStage::Post;
            }
            None => {
                let pending = self.search.candidate_len();
                self.release_all_but(chunk, pending, out)?;
            }
        }
        Ok(())
    }

    /// Forward `held + chunk` except its last `keep` bytes, which become
    /// the new `held`.
    fn release_all_but(&mut self, chunk: &str, keep: usize, out: &mut dyn EventSink) -> Result<()> {
        let total = self.held.len() + chunk.len();
        debug_assert!(keep <= total, "header candidate longer than scanned text");
        let release = total - keep;

        if release <= self.held.len() {
            out.characters(&self.held[..release])?;
            self.held.replace_range(..release, "");
            self.held.push_str(chunk);
        } else {
            let from_chunk = release - self.held.len();
            out.characters(&self.held)?;
            out.characters(&chunk[..from_chunk])?;
            self.held.clear();
            self.held.push_str(&chunk[from_chunk..]);
        }
        Ok(())
    }
}

impl<M: HeaderMatcher> TextFilter for LanguagePrefilter<M> {
    fn start_text(&mut self, _ctx: &TextContext<'_>) {
        self.stage = SectionStage::Pre;
        self.search = HeaderSearch::new();
        self.held.clear();
    }

    fn text(&mut self, chunk: &str, _ctx: &TextContext<'_>, out: &mut dyn EventSink) -> Result<()> {
        match self.stage {
            SectionStage::Pre => self.seek_section(chunk, out),
            SectionStage::In => self.scan_section(chunk, out),
            SectionStage::Post => Ok(()),
        }
    }

    fn end_text(&mut self, _ctx: &TextContext<'_>, out: &mut dyn EventSink) -> Result<()> {
        match self.stage {
            SectionStage::Pre => {
                // target header as the very last thing in the element
                if let Some(content) = self.search.pending_match() {
                    if self.matcher.matches(content) {
                        out.characters(&wrap_header(content))?;
                    }
                }
            }
            SectionStage::In => {
                // a balanced header still held ends the section; anything
                // else held is plain text
                if !self.search.possibly_complete() {
                    out.characters(&self.held)?;
                }
            }
            SectionStage::Post => {}
        }
        self.held.clear();
        self.stage = SectionStage::Post;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefilter::test_support::{chunked, run_text};

    const CHUNKINGS: &[&[usize]] = &[&[1], &[2], &[3], &[7], &[3, 1, 5], &[13, 2], &[1 << 20]];

    fn polish() -> LanguagePrefilter {
        LanguagePrefilter::new("Polish").unwrap()
    }

    /// Run `input` through a fresh filter under many chunkings and require
    /// identical output each time.
    fn filtered<M: HeaderMatcher>(make: impl Fn() -> LanguagePrefilter<M>, input: &str) -> String {
        let whole = run_text(&mut make(), &[input]);
        for sizes in CHUNKINGS {
            let pieces = chunked(input, sizes);
            assert_eq!(
                run_text(&mut make(), &pieces),
                whole,
                "chunking {:?} of {:?}",
                sizes,
                input
            );
        }
        whole
    }

    #[test]
    fn drops_text_without_target() {
        assert_eq!(filtered(polish, "abc"), "");
        assert_eq!(filtered(polish, "abcdefghijk012343498397"), "");
        assert_eq!(filtered(polish, "==English==\nfoo\n==German==\nbar"), "");
    }

    #[test]
    fn drops_wrong_level_and_broken_headers() {
        assert_eq!(filtered(polish, "03===Polish===p  03=Polish==p"), "");
        assert_eq!(filtered(polish, "abcdefg=Polish==xyz"), "");
        assert_eq!(filtered(polish, "==NotPolish== stuff"), "");
        assert_eq!(filtered(polish, "==Polish\n== stuff"), "");
    }

    #[test]
    fn keeps_section_with_its_header() {
        assert_eq!(
            filtered(polish, "==Polish==\nKeep Line 1\nKeep Line 2"),
            "==Polish==\nKeep Line 1\nKeep Line 2"
        );
        assert_eq!(
            filtered(polish, "abcdefg hijklmnop==Polish==Keep Line 1\nKeep Line 2"),
            "==Polish==Keep Line 1\nKeep Line 2"
        );
    }

    #[test]
    fn section_ends_at_next_header() {
        assert_eq!(filtered(polish, "A ==Lang1== B ==Polish== C"), "==Polish== C");
        assert_eq!(
            filtered(
                polish,
                "==English==\neng\n==Polish==\npol 1\npol 2\n==Russian==\nrus\n==Polish==\nagain"
            ),
            "==Polish==\npol 1\npol 2\n"
        );
    }

    #[test]
    fn deeper_headers_stay_in_section() {
        assert_eq!(
            filtered(
                polish,
                "==Polish==\n===Noun===\nkot\n====Declension====\nx\n==Czech==\ny"
            ),
            "==Polish==\n===Noun===\nkot\n====Declension====\nx\n"
        );
    }

    #[test]
    fn unbalanced_and_unclosed_headers_pass_through_section() {
        assert_eq!(
            filtered(polish, "==Polish==\n===odd== a ==b=== c ==unclosed\nd"),
            "==Polish==\n===odd== a ==b=== c ==unclosed\nd"
        );
    }

    #[test]
    fn lone_markers_pass_through_section() {
        assert_eq!(
            filtered(polish, "==Polish==\na = b, c=d\n=="),
            "==Polish==\na = b, c=d\n=="
        );
    }

    #[test]
    fn header_at_end_of_text_closes_section() {
        assert_eq!(filtered(polish, "==Polish==\nbody\n==Czech=="), "==Polish==\nbody\n");
    }

    #[test]
    fn unclosed_candidate_at_end_is_released() {
        assert_eq!(filtered(polish, "==Polish==\nbody ==Cz"), "==Polish==\nbody ==Cz");
        assert_eq!(filtered(polish, "==Polish==\nbody ==Cz="), "==Polish==\nbody ==Cz=");
        assert_eq!(filtered(polish, "==Polish==\nbody ==Cz==="), "==Polish==\nbody ==Cz===");
    }

    #[test]
    fn target_header_at_very_end() {
        assert_eq!(filtered(polish, "junk\n==Polish=="), "==Polish==");
    }

    #[test]
    fn empty_section_keeps_header() {
        assert_eq!(filtered(polish, "==Polish====Czech== rest"), "");
        assert_eq!(filtered(polish, "==Polish==\n==Czech== rest"), "==Polish==\n");
    }

    #[test]
    fn multibyte_text_survives_chunking() {
        assert_eq!(
            filtered(polish, "==Angielski==\nłódź\n==Polish==\nżółć ąę\n==Český==\nčeský"),
            "==Polish==\nżółć ąę\n"
        );
    }

    #[test]
    fn state_resets_between_text_elements() {
        let mut pf = polish();
        assert_eq!(run_text(&mut pf, &["==Polish==\nfirst ==Cz"]), "==Polish==\nfirst ==Cz");
        assert_eq!(run_text(&mut pf, &["nothing here"]), "");
        assert_eq!(run_text(&mut pf, &["x ==Pol", "ish== second"]), "==Polish== second");
    }

    #[test]
    fn post_stage_drops_remaining_calls() {
        let mut pf = polish();
        let out = run_text(
            &mut pf,
            &["==Polish==a", "==Czech==", "b", "==Polish==c"],
        );
        assert_eq!(out, "==Polish==a");
    }

    #[test]
    fn exact_matcher_is_strict() {
        assert_eq!(filtered(polish, "== Polish ==\nx"), "");
        assert_eq!(filtered(polish, "==[[Polish]]==\nx"), "");
        assert_eq!(filtered(polish, "==polish==\nx"), "");
    }

    #[test]
    fn loose_matcher_accepts_spacing_and_links() {
        let loose = || LanguagePrefilter::loose("Polish").unwrap();
        assert_eq!(filtered(loose, "== Polish ==\nx"), "== Polish ==\nx");
        assert_eq!(filtered(loose, "==[[Polish]]==\nx"), "==[[Polish]]==\nx");
        assert_eq!(filtered(loose, "== [[ Polish ]] ==\nx"), "== [[ Polish ]] ==\nx");
        assert_eq!(filtered(loose, "==Polish==\nx"), "==Polish==\nx");
        assert_eq!(filtered(loose, "==polish==\nx"), "");
        assert_eq!(filtered(loose, "==[[Polish]==\nx"), "");
    }

    #[test]
    fn loose_normalize() {
        assert_eq!(LooseName::normalize("  Polish\t"), "Polish");
        assert_eq!(LooseName::normalize("[[Polish]]"), "Polish");
        assert_eq!(LooseName::normalize(" [[ Old Polish ]] "), "Old Polish");
        assert_eq!(LooseName::normalize("[Polish]"), "[Polish]");
    }

    #[test]
    fn closure_matcher() {
        let any_slavic = || {
            LanguagePrefilter::with_matcher(|c: &str| matches!(c, "Polish" | "Czech"))
        };
        assert_eq!(filtered(any_slavic, "==English==a==Czech==b==Polish==c"), "==Czech==b");
    }

    #[test]
    fn empty_language_rejected() {
        assert!(LanguagePrefilter::new("").is_err());
        assert!(LanguagePrefilter::loose(" [[ ]] ").is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn output_independent_of_chunking(
                input in "(==Polish==|==Czech==|===Noun===|=|\n|[a-z ]{0,6}){0,24}",
                sizes in prop::collection::vec(1usize..12, 1..6),
            ) {
                let whole = run_text(&mut polish(), &[input.as_str()]);
                let pieces = chunked(&input, &sizes);
                prop_assert_eq!(run_text(&mut polish(), &pieces), whole);
            }

            #[test]
            fn output_starts_with_target_header(
                input in "(==Polish==|==Czech==|=|\n|[a-z ]{0,6}){0,24}",
            ) {
                let out = run_text(&mut polish(), &[input.as_str()]);
                prop_assert!(out.is_empty() || out.starts_with("==Polish=="));
            }
        }
    }
}
