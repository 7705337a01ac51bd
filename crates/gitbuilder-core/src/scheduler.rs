//! Scheduler: choose the single next commit to build on a branch.
//!
//! One linear scan over the revision window (newest to oldest) tracks:
//! - the oldest passing commit seen,
//! - the oldest failing commit seen,
//! - the newest untested commit that comes before any failure,
//! - the oldest commit in the window.
//!
//! Decision order: build the untested commit if there is one; otherwise
//! bisect between the pass and fail boundaries; otherwise the branch is up
//! to date.

use std::sync::Arc;

use tracing::{debug, warn};
use verdict_state::{Verdict, VerdictLedger};

use crate::bisect::FaultLocalizer;
use crate::domain::{Branch, Result, RevisionWindow};
use crate::vcs::{BisectionOracle, HistoryProvider};

/// Outcome of scanning a window, before any bisection is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Build this never-built commit (newest one ahead of any failure).
    Build(String),
    /// Narrow the regression between `good` and `bad`.
    Bisect { good: Option<String>, bad: String },
    /// Nothing pending and no resolvable failure boundary.
    UpToDate,
}

/// Scan `window` and decide what to do next. Pure.
pub fn plan(window: &RevisionWindow) -> Plan {
    let mut pass_seen: Option<&str> = None;
    let mut fail_seen: Option<&str> = None;
    let mut pending: Option<&str> = None;
    let mut oldest: Option<&str> = None;

    for entry in window.iter() {
        match entry.verdict {
            Verdict::Pass => pass_seen = Some(entry.hash()),
            Verdict::Fail => fail_seen = Some(entry.hash()),
            Verdict::Untested | Verdict::Ignore => {
                if pending.is_none() && fail_seen.is_none() {
                    pending = Some(entry.hash());
                }
            }
        }
        oldest = Some(entry.hash());
    }

    if let Some(commit) = pending {
        return Plan::Build(commit.to_string());
    }
    match (fail_seen, pass_seen) {
        (Some(bad), Some(good)) => Plan::Bisect {
            good: Some(good.to_string()),
            bad: bad.to_string(),
        },
        (Some(bad), None) if oldest != Some(bad) => Plan::Bisect {
            good: None,
            bad: bad.to_string(),
        },
        _ => Plan::UpToDate,
    }
}

/// Per-branch scheduler over injected history, oracle and ledger handles.
#[derive(Clone)]
pub struct Scheduler {
    history: Arc<dyn HistoryProvider>,
    ledger: Arc<dyn VerdictLedger>,
    localizer: FaultLocalizer,
}

impl Scheduler {
    pub fn new(
        history: Arc<dyn HistoryProvider>,
        oracle: Arc<dyn BisectionOracle>,
        ledger: Arc<dyn VerdictLedger>,
    ) -> Self {
        let localizer = FaultLocalizer::new(oracle, ledger.clone());
        Self {
            history,
            ledger,
            localizer,
        }
    }

    /// Revision window for `branch`.
    ///
    /// A history failure is logged and yields an empty window; ledger read
    /// errors are returned.
    pub async fn window(&self, branch: &Branch) -> Result<RevisionWindow> {
        window_for(self.history.as_ref(), self.ledger.as_ref(), branch).await
    }

    /// The next commit to build on `branch`, or `None` when up to date.
    pub async fn next_revision(&self, branch: &Branch) -> Result<Option<String>> {
        let window = self.window(branch).await?;
        match plan(&window) {
            Plan::Build(commit) => {
                debug!(branch = %branch.name, commit = %commit, "untested commit pending");
                Ok(Some(commit))
            }
            Plan::Bisect { good, bad } => {
                if good.is_none() {
                    debug!(branch = %branch.name, bad = %bad, "failure without a known-good commit");
                }
                self.localizer.bisect(good.as_deref(), &bad).await
            }
            Plan::UpToDate => Ok(None),
        }
    }
}

/// Shared window construction for the scheduler and the report.
pub(crate) async fn window_for(
    history: &dyn HistoryProvider,
    ledger: &dyn VerdictLedger,
    branch: &Branch,
) -> Result<RevisionWindow> {
    let commits = match history.history(branch).await {
        Ok(commits) => commits,
        Err(e) => {
            warn!(branch = %branch.name, error = %e, "history unavailable, treating branch as empty");
            return Ok(RevisionWindow::empty());
        }
    };
    Ok(RevisionWindow::collect(commits, ledger).await?)
}
