use serde::Serialize;

/// Running counts of post-filter decisions for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub pages_seen: u64,
    pub pages_kept: u64,
    pub revisions_seen: u64,
    pub revisions_kept: u64,
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&mut self, kept: bool) {
        self.pages_seen += 1;
        if kept {
            self.pages_kept += 1;
        }
    }

    pub fn record_revision(&mut self, kept: bool) {
        self.revisions_seen += 1;
        if kept {
            self.revisions_kept += 1;
        }
    }

    pub fn pages_dumped(&self) -> u64 {
        self.pages_seen - self.pages_kept
    }

    pub fn revisions_dumped(&self) -> u64 {
        self.revisions_seen - self.revisions_kept
    }
}
