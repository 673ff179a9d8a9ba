//! Incremental search for `==Name==` section headers.
//!
//! Character data arrives in slices of arbitrary size, so a header may be
//! split across any number of calls to [`HeaderSearch::process`]. The data is
//! also dirty: headers may be unclosed (`==Name` then a newline) or
//! unbalanced (`===Name==`). Only balanced level-2 headers produce a match;
//! an unbalanced header is consumed as a unit and scanning resumes after it.

use crate::config::{HEADER_LEVEL, HEADER_MARKER};
use memchr::memchr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Pre,
    Open,
    In,
    Close,
    Post,
}

/// A complete, balanced header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    /// `Polish` for `==Polish==`
    pub content: String,
    /// Byte offset in the completing call's slice just past the closing markers
    pub next: usize,
    /// Byte length of the whole header including markers. May exceed `next`
    /// when the header began in an earlier call.
    pub len: usize,
}

impl HeaderMatch {
    pub fn full_header(&self) -> String {
        wrap_header(&self.content)
    }
}

/// Surround `content` with level-2 markers.
pub fn wrap_header(content: &str) -> String {
    let markers: String = std::iter::repeat(HEADER_MARKER).take(HEADER_LEVEL).collect();
    let mut header = String::with_capacity(content.len() + 2 * HEADER_LEVEL);
    header.push_str(&markers);
    header.push_str(content);
    header.push_str(&markers);
    header
}

/// One search session. After a match the session is finished; callers
/// start a fresh one to look for the next header.
#[derive(Debug, Clone)]
pub struct HeaderSearch {
    stage: Stage,
    found_in_stage: usize,
    content: String,
    open_size: usize,
    // bytes of the header candidate in progress, across calls
    candidate_len: usize,
}

impl Default for HeaderSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderSearch {
    pub fn new() -> Self {
        Self {
            stage: Stage::Pre,
            found_in_stage: 0,
            content: String::new(),
            open_size: 0,
            candidate_len: 0,
        }
    }

    /// Scan `chunk`, continuing any header begun in a previous call.
    ///
    /// Returns the first balanced header completed inside `chunk`. A closing
    /// run at the very end of `chunk` is held open, since the next call may
    /// extend it; see [`HeaderSearch::pending_match`] for end of input.
    pub fn process(&mut self, chunk: &str) -> Option<HeaderMatch> {
        let bytes = chunk.as_bytes();
        let mut i = 0;

        while i < chunk.len() {
            match self.stage {
                Stage::Post => return None,
                Stage::Pre => {
                    // Nothing outside a marker matters while idle.
                    match memchr(HEADER_MARKER as u8, &bytes[i..]) {
                        Some(offset) => i += offset,
                        None => return None,
                    }
                }
                _ => {}
            }

            let ch = chunk[i..].chars().next()?;
            self.step(ch);
            if self.stage == Stage::Post {
                return Some(HeaderMatch {
                    content: std::mem::take(&mut self.content),
                    next: i,
                    len: self.candidate_len,
                });
            }
            i += ch.len_utf8();
        }

        None
    }

    /// The header content if the input so far ends exactly on a balanced
    /// closing run. Use when no more input will arrive.
    pub fn pending_match(&self) -> Option<&str> {
        if self.stage == Stage::Close
            && self.found_in_stage == HEADER_LEVEL
            && self.open_size == HEADER_LEVEL
        {
            Some(&self.content)
        } else {
            None
        }
    }

    pub fn possibly_complete(&self) -> bool {
        self.pending_match().is_some()
    }

    /// Byte length of the trailing text that may still turn out to be a header.
    pub fn candidate_len(&self) -> usize {
        match self.stage {
            Stage::Pre => 0,
            _ => self.candidate_len,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Post
    }

    fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
        self.found_in_stage = 0;
    }

    fn reset(&mut self) {
        self.set_stage(Stage::Pre);
        self.candidate_len = 0;
    }

    fn step(&mut self, ch: char) {
        match self.stage {
            Stage::Pre => self.step_pre(ch),
            Stage::Open => self.step_open(ch),
            Stage::In => self.step_in(ch),
            Stage::Close => self.step_close(ch),
            Stage::Post => {}
        }
    }

    fn step_pre(&mut self, ch: char) {
        if ch == HEADER_MARKER {
            self.set_stage(Stage::Open);
            self.candidate_len = 0;
            self.step_open(ch);
        }
    }

    fn step_open(&mut self, ch: char) {
        if ch == HEADER_MARKER {
            self.found_in_stage += 1;
            self.candidate_len += ch.len_utf8();
        } else if self.found_in_stage >= HEADER_LEVEL {
            self.content.clear();
            self.open_size = self.found_in_stage;
            self.set_stage(Stage::In);
            self.step_in(ch);
        } else {
            // a lone marker is just text
            self.reset();
            self.step_pre(ch);
        }
    }

    fn step_in(&mut self, ch: char) {
        if ch == HEADER_MARKER {
            self.set_stage(Stage::Close);
            self.step_close(ch);
        } else if ch == '\n' {
            // headers never cross lines
            self.reset();
        } else {
            self.content.push(ch);
            self.candidate_len += ch.len_utf8();
        }
    }

    fn step_close(&mut self, ch: char) {
        if ch == HEADER_MARKER {
            self.found_in_stage += 1;
            self.candidate_len += ch.len_utf8();
        } else if self.found_in_stage < HEADER_LEVEL {
            for _ in 0..self.found_in_stage {
                self.content.push(HEADER_MARKER);
            }
            self.set_stage(Stage::In);
            self.step_in(ch);
        } else if self.found_in_stage == HEADER_LEVEL && self.open_size == HEADER_LEVEL {
            self.set_stage(Stage::Post);
        } else {
            // unbalanced: consumed as a unit, no match
            self.reset();
            self.step_pre(ch);
        }
    }
}
