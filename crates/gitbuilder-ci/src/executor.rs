//! Build executor: checkout, run, record.
//!
//! The only writer of the verdict ledger. A commit gets a verdict only when
//! its build actually ran; checkout failures and unstartable commands are
//! reported to the caller and leave the ledger untouched.

use std::sync::Arc;

use chrono::Utc;
use gitbuilder_core::obs::{emit_build_finished, emit_build_started, emit_verdict_recorded};
use gitbuilder_core::WorkingTreeController;
use tracing::{error, warn};
use verdict_state::{LogDigest, Verdict, VerdictLedger};

use crate::command::BuildCommand;
use crate::error::Result;
use crate::runner::{BuildRunner, RunOutput};

/// What happened to one build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The build ran and its verdict was written.
    Recorded {
        verdict: Verdict,
        run: RunOutput,
        log_digest: LogDigest,
    },
    /// The working tree could not be moved to the commit.
    CheckoutFailed(String),
    /// The build command could not be started.
    NotStarted(String),
}

impl BuildOutcome {
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            BuildOutcome::Recorded { verdict, .. } => Some(*verdict),
            _ => None,
        }
    }
}

/// Runs builds in one working tree and records their verdicts.
#[derive(Clone)]
pub struct BuildExecutor {
    tree: Arc<dyn WorkingTreeController>,
    ledger: Arc<dyn VerdictLedger>,
    command: BuildCommand,
}

impl BuildExecutor {
    /// `command.work_dir` is replaced by the tree's path.
    pub fn new(
        tree: Arc<dyn WorkingTreeController>,
        ledger: Arc<dyn VerdictLedger>,
        command: BuildCommand,
    ) -> Self {
        let command = BuildCommand {
            work_dir: tree.path().to_path_buf(),
            ..command
        };
        Self {
            tree,
            ledger,
            command,
        }
    }

    pub fn command(&self) -> &BuildCommand {
        &self.command
    }

    /// Build `commit` for `branch` and record the verdict.
    ///
    /// Only ledger failures are returned as errors.
    pub async fn run_build(&self, branch: &str, commit: &str) -> Result<BuildOutcome> {
        if let Err(e) = self.tree.checkout(commit).await {
            warn!(branch = %branch, commit = %commit, error = %e, "checkout failed, skipping build");
            return Ok(BuildOutcome::CheckoutFailed(e.to_string()));
        }

        emit_build_started(branch, commit);
        let started_at = Utc::now();
        let run = match BuildRunner::run(&self.command).await {
            Ok(run) => run,
            Err(e) => {
                error!(branch = %branch, commit = %commit, error = %e, "build command could not be run, no verdict recorded");
                return Ok(BuildOutcome::NotStarted(e.to_string()));
            }
        };
        emit_build_finished(branch, commit, run.exit_code, run.duration_ms, run.timed_out);

        let verdict = run.verdict();
        let log = self.build_log(branch, commit, &started_at.to_rfc3339(), &run);
        self.ledger.record(commit, verdict, &log).await?;

        let log_digest = LogDigest::from_bytes(&log);
        emit_verdict_recorded(commit, verdict, log_digest.as_str());
        Ok(BuildOutcome::Recorded {
            verdict,
            run,
            log_digest,
        })
    }

    fn build_log(&self, branch: &str, commit: &str, started_at: &str, run: &RunOutput) -> Vec<u8> {
        let mut log = format!(
            "gitbuilder: commit {commit}\ngitbuilder: branch {branch}\ngitbuilder: started {started_at}\n\n"
        )
        .into_bytes();
        log.extend_from_slice(&run.output);
        if run.timed_out {
            if !log.ends_with(b"\n") {
                log.push(b'\n');
            }
            let limit = self.command.timeout.map(|t| t.as_secs()).unwrap_or_default();
            log.extend_from_slice(format!("gitbuilder: build timed out after {limit}s\n").as_bytes());
        }
        log
    }
}
