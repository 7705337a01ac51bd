//! Revision window: the part of a branch's history still worth looking at.
//!
//! Built newest-first from first-parent history. Ignored commits are
//! dropped; the walk stops at (and includes) the first passing commit,
//! since everything older is taken as good.

use serde::{Deserialize, Serialize};
use verdict_state::{StorageResult, Verdict, VerdictLedger};

use super::commit::Commit;

/// A commit in the window with the verdict it had when the window was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub commit: Commit,
    pub verdict: Verdict,
}

impl WindowEntry {
    pub fn new(commit: Commit, verdict: Verdict) -> Self {
        Self { commit, verdict }
    }

    pub fn hash(&self) -> &str {
        &self.commit.hash
    }
}

/// Ignore-filtered, Pass-truncated history, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionWindow {
    entries: Vec<WindowEntry>,
}

impl RevisionWindow {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up each commit of `history` (newest first) in the ledger.
    pub async fn collect(history: Vec<Commit>, ledger: &dyn VerdictLedger) -> StorageResult<Self> {
        let mut window = Self::empty();
        for commit in history {
            let verdict = ledger.verdict(&commit.hash).await?;
            if !window.push(WindowEntry::new(commit, verdict)) {
                break;
            }
        }
        Ok(window)
    }

    /// Build from pre-classified entries, applying the same filtering and
    /// truncation as [`RevisionWindow::collect`].
    pub fn from_entries(entries: impl IntoIterator<Item = WindowEntry>) -> Self {
        let mut window = Self::empty();
        for entry in entries {
            if !window.push(entry) {
                break;
            }
        }
        window
    }

    /// Returns `false` once the window is closed by a passing commit.
    fn push(&mut self, entry: WindowEntry) -> bool {
        match entry.verdict {
            Verdict::Ignore => true,
            Verdict::Pass => {
                self.entries.push(entry);
                false
            }
            Verdict::Fail | Verdict::Untested => {
                self.entries.push(entry);
                true
            }
        }
    }

    pub fn entries(&self) -> &[WindowEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Commit hashes in window order.
    pub fn hashes(&self) -> Vec<&str> {
        self.entries.iter().map(WindowEntry::hash).collect()
    }
}
