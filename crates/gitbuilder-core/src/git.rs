//! Git integration: history, working tree and bisection via the `git` binary.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::{Branch, BuilderError, Commit, Result};
use crate::vcs::{BisectionOracle, HistoryProvider, WorkingTreeController};

/// `for-each-ref` format: object, peeled object (annotated tags only), ref.
const REF_FORMAT: &str = "--format=%(objectname)%09%(*objectname)%09%(refname)";

/// `log` format: hash, committer email, subject.
const LOG_FORMAT: &str = "--format=%H%x09%ce%x09%s";

/// Ref namespaces that are tracked.
const TRACKED_NAMESPACES: [&str; 2] = ["refs/remotes/", "refs/tags/"];

/// Run `git` in `dir` and return its stdout.
async fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| BuilderError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BuilderError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Short display name of a tracked ref, or `None` for refs that are not
/// built (local heads, symbolic `HEAD`, anything outside remotes/tags).
pub fn short_ref_name(refname: &str) -> Option<&str> {
    let refname = refname.trim_end_matches("^{}");
    if refname.ends_with("/HEAD") {
        return None;
    }
    if !TRACKED_NAMESPACES.iter().any(|ns| refname.starts_with(ns)) {
        return None;
    }
    refname.splitn(3, '/').nth(2).filter(|n| !n.is_empty())
}

/// Parse `for-each-ref` output produced with [`REF_FORMAT`].
pub fn parse_refs(output: &str) -> Vec<Branch> {
    let mut seen = HashSet::new();
    let mut branches = Vec::new();

    for line in output.lines() {
        let mut fields = line.split('\t');
        let (Some(object), Some(peeled), Some(refname)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let Some(name) = short_ref_name(refname.trim()) else {
            continue;
        };
        let tip = if peeled.trim().is_empty() {
            object.trim()
        } else {
            peeled.trim()
        };
        if tip.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }
        branches.push(Branch::new(name, tip));
    }

    branches
}

/// Parse `log` output produced with [`LOG_FORMAT`].
pub fn parse_log(output: &str) -> Vec<Commit> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            let hash = fields.next()?.trim();
            if hash.is_empty() {
                return None;
            }
            let email = fields.next().unwrap_or_default();
            let subject = fields.next().unwrap_or_default();
            Some(Commit::new(hash, email, subject))
        })
        .collect()
}

/// Parse `rev-list --bisect-all` (or `--bisect`) output: one commit per
/// line, optionally followed by a `(dist=N)` annotation.
pub fn parse_candidates(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|hash| hash.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_string)
        .collect()
}

/// [`HistoryProvider`], [`WorkingTreeController`] and [`BisectionOracle`]
/// backed by the `git` command line in a single working tree.
#[derive(Debug, Clone)]
pub struct GitCli {
    work_tree: PathBuf,
    repo_url: String,
}

impl GitCli {
    pub fn new(work_tree: impl Into<PathBuf>, repo_url: impl Into<String>) -> Self {
        Self {
            work_tree: work_tree.into(),
            repo_url: repo_url.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.work_tree, args).await
    }

    /// Whether the working tree already holds a git checkout.
    pub fn is_prepared(&self) -> bool {
        self.work_tree.join(".git").exists()
    }
}

#[async_trait]
impl HistoryProvider for GitCli {
    async fn branches(&self) -> Result<Vec<Branch>> {
        let out = self
            .git(&[
                "for-each-ref",
                "--sort=-committerdate",
                REF_FORMAT,
                "refs/remotes",
                "refs/tags",
            ])
            .await?;
        let branches = parse_refs(&out);
        debug!(count = branches.len(), "enumerated branches");
        Ok(branches)
    }

    async fn history(&self, branch: &Branch) -> Result<Vec<Commit>> {
        let rev = if branch.tip.is_empty() {
            branch.name.as_str()
        } else {
            branch.tip.as_str()
        };
        let out = self
            .git(&["log", "--first-parent", LOG_FORMAT, rev, "--"])
            .await?;
        Ok(parse_log(&out))
    }
}

#[async_trait]
impl WorkingTreeController for GitCli {
    fn path(&self) -> &Path {
        &self.work_tree
    }

    async fn prepare(&self) -> Result<()> {
        if self.is_prepared() {
            info!(path = %self.work_tree.display(), "reusing existing checkout");
            return Ok(());
        }

        let parent = match self.work_tree.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;

        let target = self.work_tree.to_string_lossy().into_owned();
        info!(repo = %self.repo_url, path = %target, "cloning repository");
        run_git(
            &parent,
            &["clone", "--recurse-submodules", &self.repo_url, &target],
        )
        .await?;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.git(&["remote", "update", "--prune"]).await?;
        Ok(())
    }

    async fn checkout(&self, commit: &str) -> Result<()> {
        verdict_state::validate_commit(commit)
            .map_err(|e| BuilderError::Git(e.to_string()))?;

        self.git(&["checkout", "--force", "--detach", commit]).await?;
        self.git(&["clean", "-ffd"]).await?;
        self.git(&["reset", "--hard", commit]).await?;

        if let Err(e) = self
            .git(&["submodule", "update", "--init", "--recursive"])
            .await
        {
            warn!(commit = %commit, error = %e, "submodule update failed");
        }
        Ok(())
    }
}

#[async_trait]
impl BisectionOracle for GitCli {
    async fn bisect_all(&self, good: &str, bad: &str) -> Result<Vec<String>> {
        let upper = format!("{bad}^");
        let lower = format!("^{good}");
        let out = self
            .git(&["rev-list", "--first-parent", "--bisect-all", &upper, &lower])
            .await?;
        Ok(parse_candidates(&out))
    }

    async fn bisect_one(&self, good: &str, bad: &str) -> Result<Option<String>> {
        let upper = format!("{bad}^");
        let lower = format!("^{good}");
        let out = self
            .git(&["rev-list", "--first-parent", "--bisect", &upper, &lower])
            .await?;
        Ok(parse_candidates(&out).into_iter().next())
    }
}
