//! In-memory fakes for the version-control seams (testing only)
//!
//! `FakeRepo` holds linear first-parent histories and implements
//! [`HistoryProvider`], [`WorkingTreeController`] and [`BisectionOracle`]
//! without invoking git. Failures can be switched on per operation.
//!
//! When the work tree is an existing directory, `checkout` writes the
//! commit hash to [`FAKE_HEAD_FILE`] there so build scripts can branch on it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{Branch, BuilderError, Commit, Result};
use crate::vcs::{BisectionOracle, HistoryProvider, WorkingTreeController};

/// File in the work tree holding the currently checked-out commit.
pub const FAKE_HEAD_FILE: &str = ".fake-head";

/// Fake repository with one linear history per branch.
#[derive(Debug, Default)]
pub struct FakeRepo {
    lines: Vec<(Branch, Vec<Commit>)>,
    failing_history: HashSet<String>,
    failing_checkouts: HashSet<String>,
    bisect_all_disabled: bool,
    bisect_one_disabled: bool,
    work_tree: PathBuf,
    checkouts: Mutex<Vec<String>>,
    refreshes: AtomicUsize,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch whose history is `hashes`, newest first.
    pub fn with_branch(self, name: &str, hashes: &[&str]) -> Self {
        let commits = hashes
            .iter()
            .map(|h| Commit::new(*h, "dev@example.com", format!("commit {h}")))
            .collect();
        self.with_commits(name, commits)
    }

    /// Add a branch with fully specified commits, newest first.
    pub fn with_commits(mut self, name: &str, commits: Vec<Commit>) -> Self {
        let tip = commits.first().map(|c| c.hash.clone()).unwrap_or_default();
        self.lines.push((Branch::new(name, tip), commits));
        self
    }

    /// Make `history` fail for the named branch.
    pub fn failing_history(mut self, name: &str) -> Self {
        self.failing_history.insert(name.to_string());
        self
    }

    /// Make `checkout` fail for `commit`.
    pub fn failing_checkout(mut self, commit: &str) -> Self {
        self.failing_checkouts.insert(commit.to_string());
        self
    }

    /// Make `bisect_all` unsupported.
    pub fn without_bisect_all(mut self) -> Self {
        self.bisect_all_disabled = true;
        self
    }

    /// Make `bisect_one` unsupported.
    pub fn without_bisect_one(mut self) -> Self {
        self.bisect_one_disabled = true;
        self
    }

    pub fn with_work_tree(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_tree = path.into();
        self
    }

    /// Commits checked out so far, in order.
    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.lock().unwrap().clone()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Commits strictly between `good` and `bad` on the line containing
    /// `bad`, ranked by distance from the midpoint.
    fn interior(&self, good: &str, bad: &str) -> Result<Vec<String>> {
        let line = self
            .lines
            .iter()
            .map(|(_, commits)| commits)
            .find(|commits| commits.iter().any(|c| c.hash == bad))
            .ok_or_else(|| BuilderError::Git(format!("unknown revision {bad}")))?;

        let bad_idx = line.iter().position(|c| c.hash == bad).unwrap_or_default();
        let end = match line.iter().position(|c| c.hash == good) {
            Some(g) if g > bad_idx => g,
            Some(_) => bad_idx + 1,
            None => line.len(),
        };
        let slice = &line[bad_idx + 1..end.max(bad_idx + 1)];

        let n = slice.len() as i64;
        let mut ranked: Vec<(i64, usize, &str)> = slice
            .iter()
            .enumerate()
            .map(|(k, c)| ((2 * k as i64 - (n - 1)).abs(), k, c.hash.as_str()))
            .collect();
        ranked.sort();
        Ok(ranked.into_iter().map(|(_, _, h)| h.to_string()).collect())
    }
}

#[async_trait]
impl HistoryProvider for FakeRepo {
    async fn branches(&self) -> Result<Vec<Branch>> {
        Ok(self.lines.iter().map(|(b, _)| b.clone()).collect())
    }

    async fn history(&self, branch: &Branch) -> Result<Vec<Commit>> {
        if self.failing_history.contains(&branch.name) {
            return Err(BuilderError::Git(format!(
                "log failed for {}",
                branch.name
            )));
        }
        self.lines
            .iter()
            .find(|(b, _)| b.name == branch.name)
            .map(|(_, commits)| commits.clone())
            .ok_or_else(|| BuilderError::Git(format!("unknown branch {}", branch.name)))
    }
}

#[async_trait]
impl WorkingTreeController for FakeRepo {
    fn path(&self) -> &Path {
        &self.work_tree
    }

    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn checkout(&self, commit: &str) -> Result<()> {
        if self.failing_checkouts.contains(commit) {
            return Err(BuilderError::Git(format!("checkout of {commit} failed")));
        }
        if self.work_tree.is_dir() {
            tokio::fs::write(self.work_tree.join(FAKE_HEAD_FILE), commit).await?;
        }
        self.checkouts.lock().unwrap().push(commit.to_string());
        Ok(())
    }
}

#[async_trait]
impl BisectionOracle for FakeRepo {
    async fn bisect_all(&self, good: &str, bad: &str) -> Result<Vec<String>> {
        if self.bisect_all_disabled {
            return Err(BuilderError::Git("--bisect-all unsupported".to_string()));
        }
        self.interior(good, bad)
    }

    async fn bisect_one(&self, good: &str, bad: &str) -> Result<Option<String>> {
        if self.bisect_one_disabled {
            return Err(BuilderError::Git("--bisect unsupported".to_string()));
        }
        Ok(self.interior(good, bad)?.into_iter().next())
    }
}
