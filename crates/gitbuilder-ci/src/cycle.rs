//! One scheduling cycle over every tracked branch.
//!
//! Branches are handled one at a time in enumeration order: pick the next
//! revision, build it, record it. The status report is generated once every
//! branch has had its turn. Ledger failures abort the cycle before a report
//! is produced; everything else is logged and the cycle moves on.

use std::sync::Arc;
use std::time::Instant;

use gitbuilder_core::obs::{emit_branch_up_to_date, emit_cycle_finished, emit_cycle_started, CycleSpan};
use gitbuilder_core::{
    BisectionOracle, Branch, BranchFilter, BuilderConfig, HistoryProvider, ReportGenerator,
    Scheduler, StatusReport, WorkingTreeController,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use verdict_state::{Verdict, VerdictLedger};

use crate::command::BuildCommand;
use crate::error::Result;
use crate::executor::{BuildExecutor, BuildOutcome};

/// Tallies for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Branches considered after filtering.
    pub branches: usize,

    /// Builds that ran and recorded a verdict.
    pub builds: usize,

    pub passed: usize,
    pub failed: usize,

    /// Branches with nothing to build.
    pub up_to_date: usize,

    /// Selected commits that were not built (already verdicted, checkout
    /// failure, or the command could not start).
    pub skipped: usize,
}

/// Result of a complete cycle.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub summary: CycleSummary,
    pub report: StatusReport,
    pub duration_ms: u64,
}

/// Scheduling cycle orchestrator.
#[derive(Clone)]
pub struct BuildCycle {
    history: Arc<dyn HistoryProvider>,
    tree: Arc<dyn WorkingTreeController>,
    ledger: Arc<dyn VerdictLedger>,
    scheduler: Scheduler,
    executor: BuildExecutor,
    reporter: ReportGenerator,
    filter: BranchFilter,
    refresh_remotes: bool,
}

impl BuildCycle {
    /// Wire a cycle from a config and one repository handle that provides
    /// history, the working tree and bisection.
    pub fn new<R>(config: &BuilderConfig, repo: Arc<R>, ledger: Arc<dyn VerdictLedger>) -> Result<Self>
    where
        R: HistoryProvider + WorkingTreeController + BisectionOracle + 'static,
    {
        let history: Arc<dyn HistoryProvider> = repo.clone();
        let tree: Arc<dyn WorkingTreeController> = repo.clone();
        let oracle: Arc<dyn BisectionOracle> = repo;

        Ok(Self {
            scheduler: Scheduler::new(history.clone(), oracle, ledger.clone()),
            executor: BuildExecutor::new(tree.clone(), ledger.clone(), BuildCommand::from_config(config)),
            reporter: ReportGenerator::new(history.clone(), ledger.clone()),
            filter: config.branch_filter()?,
            refresh_remotes: config.refresh_remotes,
            history,
            tree,
            ledger,
        })
    }

    /// Run one full cycle and produce the status report.
    pub async fn run(&self) -> Result<CycleResult> {
        let start = Instant::now();
        let _span = CycleSpan::enter(&self.tree.path().display().to_string());

        self.ledger.ensure_partitions().await?;

        let branches = self.tracked_branches().await?;
        emit_cycle_started(branches.len());

        let mut summary = CycleSummary {
            branches: branches.len(),
            ..CycleSummary::default()
        };

        for branch in &branches {
            let Some(commit) = self.scheduler.next_revision(branch).await? else {
                emit_branch_up_to_date(&branch.name);
                summary.up_to_date += 1;
                continue;
            };

            let current = self.ledger.verdict(&commit).await?;
            if current != Verdict::Untested {
                debug!(branch = %branch.name, commit = %commit, verdict = %current, "already has a verdict");
                summary.skipped += 1;
                continue;
            }

            if self.refresh_remotes {
                if let Err(e) = self.tree.refresh().await {
                    warn!(error = %e, "remote refresh failed, building with current refs");
                }
            }

            match self.executor.run_build(&branch.name, &commit).await? {
                BuildOutcome::Recorded { verdict, .. } => {
                    summary.builds += 1;
                    match verdict {
                        Verdict::Pass => summary.passed += 1,
                        _ => summary.failed += 1,
                    }
                }
                BuildOutcome::CheckoutFailed(_) | BuildOutcome::NotStarted(_) => {
                    summary.skipped += 1;
                }
            }
        }

        let report = self.reporter.generate(&branches).await?;
        emit_cycle_finished(
            summary.branches,
            summary.builds,
            summary.passed,
            summary.failed,
            summary.skipped,
        );

        Ok(CycleResult {
            summary,
            report,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Branches to schedule: enumeration minus name-ignored branches and
    /// branches whose tip is marked ignore.
    async fn tracked_branches(&self) -> Result<Vec<Branch>> {
        let all = match self.history.branches().await {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "branch enumeration failed, nothing to schedule");
                return Ok(Vec::new());
            }
        };

        let mut tracked = Vec::with_capacity(all.len());
        for branch in all {
            if self.filter.is_ignored(&branch.name) {
                debug!(branch = %branch.name, "ignored by name");
                continue;
            }
            if self.ledger.verdict(&branch.tip).await? == Verdict::Ignore {
                info!(branch = %branch.name, tip = %branch.tip, "tip marked ignore, skipping branch");
                continue;
            }
            tracked.push(branch);
        }
        Ok(tracked)
    }
}
