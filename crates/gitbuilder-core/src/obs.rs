//! Structured lifecycle events for a build cycle.
//!
//! Every event carries an `event` field (`cycle.started`, `build.finished`,
//! ...) so JSON logs can be filtered without parsing messages.

use tracing::info;
use verdict_state::Verdict;

/// RAII guard that enters a cycle-scoped span.
///
/// ```ignore
/// let _span = CycleSpan::enter("/srv/build/work");
/// // everything logged here carries build_path=/srv/build/work
/// ```
pub struct CycleSpan {
    _span: tracing::span::EnteredSpan,
}

impl CycleSpan {
    pub fn enter(build_path: &str) -> Self {
        let span = tracing::info_span!("gitbuilder.cycle", build_path = %build_path);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_cycle_started(branches: usize) {
    info!(event = "cycle.started", branches = branches);
}

pub fn emit_branch_up_to_date(branch: &str) {
    info!(event = "branch.up_to_date", branch = %branch);
}

pub fn emit_build_started(branch: &str, commit: &str) {
    info!(event = "build.started", branch = %branch, commit = %commit);
}

/// Emit event: build process finished (or was killed at its deadline).
pub fn emit_build_finished(
    branch: &str,
    commit: &str,
    exit_code: Option<i32>,
    duration_ms: u64,
    timed_out: bool,
) {
    info!(
        event = "build.finished",
        branch = %branch,
        commit = %commit,
        exit_code = ?exit_code,
        duration_ms = duration_ms,
        timed_out = timed_out,
    );
}

pub fn emit_verdict_recorded(commit: &str, verdict: Verdict, log_digest: &str) {
    info!(
        event = "verdict.recorded",
        commit = %commit,
        verdict = %verdict,
        log_digest = %log_digest,
    );
}

/// Emit event: cycle finished with its tallies.
pub fn emit_cycle_finished(
    branches: usize,
    builds: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
) {
    info!(
        event = "cycle.finished",
        branches = branches,
        builds = builds,
        passed = passed,
        failed = failed,
        skipped = skipped,
    );
}
