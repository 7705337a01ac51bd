//! Capability traits for the version-control collaborators.
//!
//! The scheduler, localizer, executor and report only ever talk to git
//! through these seams. [`crate::git::GitCli`] implements all three against
//! the `git` binary; [`crate::fakes::FakeRepo`] implements them in memory.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{Branch, Commit, Result};

/// Source of branches and their first-parent history.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Tracked refs, most recently committed first. Symbolic `HEAD` refs are
    /// never returned.
    async fn branches(&self) -> Result<Vec<Branch>>;

    /// First-parent history of `branch`, newest first.
    async fn history(&self, branch: &Branch) -> Result<Vec<Commit>>;
}

/// Exclusive controller of the single build working tree.
#[async_trait]
pub trait WorkingTreeController: Send + Sync {
    /// Directory builds run in.
    fn path(&self) -> &Path;

    /// Make sure a checkout of the source repository exists.
    async fn prepare(&self) -> Result<()>;

    /// Prune stale remote-tracking refs and fetch new ones.
    async fn refresh(&self) -> Result<()>;

    /// Check out `commit`, drop untracked files and hard-reset tracked ones.
    async fn checkout(&self, commit: &str) -> Result<()>;
}

/// Bisection over first-parent history.
#[async_trait]
pub trait BisectionOracle: Send + Sync {
    /// Every candidate strictly between `good` and `bad`, best midpoint first.
    async fn bisect_all(&self, good: &str, bad: &str) -> Result<Vec<String>>;

    /// The single best midpoint between `good` and `bad`, if any.
    async fn bisect_one(&self, good: &str, bad: &str) -> Result<Option<String>>;
}
