//! Commits and branches as reported by the history provider.

use serde::{Deserialize, Serialize};

/// Length of the abbreviated hash shown in reports.
pub const SHORT_HASH_LEN: usize = 7;

/// One commit on a branch's first-parent line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full object name.
    pub hash: String,

    /// Committer email.
    pub email: String,

    /// First line of the commit message.
    pub subject: String,
}

impl Commit {
    pub fn new(
        hash: impl Into<String>,
        email: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            email: email.into(),
            subject: subject.into(),
        }
    }

    /// Abbreviated hash (first 7 characters).
    pub fn short_hash(&self) -> &str {
        let end = self
            .hash
            .char_indices()
            .nth(SHORT_HASH_LEN)
            .map_or(self.hash.len(), |(i, _)| i);
        &self.hash[..end]
    }
}

/// A tracked ref: remote-tracking branch or tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Branch {
    /// Short name, e.g. `origin/main` or `v1.2.0`.
    pub name: String,

    /// Commit the ref points at (peeled for annotated tags).
    pub tip: String,
}

impl Branch {
    pub fn new(name: impl Into<String>, tip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tip: tip.into(),
        }
    }
}
