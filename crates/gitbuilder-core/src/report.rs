//! Per-branch status report.
//!
//! Each branch's revision window is walked newest first:
//! - a passing commit emits an `ok` row and ends the branch,
//! - every failing commit emits a `FAIL` row,
//! - an untested commit ahead of any failure emits a `pending` row and ends
//!   the branch.
//!
//! Untested commits behind a failure produce no row.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use verdict_state::{Verdict, VerdictLedger};

use crate::domain::{Branch, Result, RevisionWindow, WindowEntry};
use crate::scheduler::window_for;
use crate::vcs::HistoryProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    Ok,
    Fail,
    Pending,
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BranchStatus::Ok => "ok",
            BranchStatus::Fail => "FAIL",
            BranchStatus::Pending => "pending",
        })
    }
}

/// One line of the report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct ReportRow {
    #[tabled(rename = "Branch")]
    pub branch: String,
    #[tabled(rename = "Status")]
    pub status: BranchStatus,
    #[tabled(rename = "Commit")]
    pub commit: String,
    #[tabled(rename = "Who")]
    pub email: String,
    #[tabled(rename = "Reason")]
    pub subject: String,
}

impl ReportRow {
    fn new(branch: &str, status: BranchStatus, entry: &WindowEntry) -> Self {
        Self {
            branch: branch.to_string(),
            status,
            commit: entry.commit.short_hash().to_string(),
            email: entry.commit.email.clone(),
            subject: entry.commit.subject.clone(),
        }
    }
}

/// Rows for a single branch.
pub fn branch_rows(branch: &str, window: &RevisionWindow) -> Vec<ReportRow> {
    let mut rows = Vec::new();
    let mut failing = false;

    for entry in window.iter() {
        match entry.verdict {
            Verdict::Pass => {
                rows.push(ReportRow::new(branch, BranchStatus::Ok, entry));
                break;
            }
            Verdict::Fail => {
                failing = true;
                rows.push(ReportRow::new(branch, BranchStatus::Fail, entry));
            }
            Verdict::Untested | Verdict::Ignore => {
                if !failing {
                    rows.push(ReportRow::new(branch, BranchStatus::Pending, entry));
                    break;
                }
            }
        }
    }
    rows
}

/// Aggregate report over all branches of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub rows: Vec<ReportRow>,
}

impl StatusReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with the given status.
    pub fn count(&self, status: BranchStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// Render the five-column table.
    pub fn render(&self) -> String {
        let mut table = Table::new(&self.rows);
        table.with(Style::ascii());
        table.to_string()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Read-only walk of every branch against the ledger.
#[derive(Clone)]
pub struct ReportGenerator {
    history: Arc<dyn HistoryProvider>,
    ledger: Arc<dyn VerdictLedger>,
}

impl ReportGenerator {
    pub fn new(history: Arc<dyn HistoryProvider>, ledger: Arc<dyn VerdictLedger>) -> Self {
        Self { history, ledger }
    }

    /// Build the report for `branches`, in the order given.
    pub async fn generate(&self, branches: &[Branch]) -> Result<StatusReport> {
        let mut rows = Vec::new();
        for branch in branches {
            let window = window_for(self.history.as_ref(), self.ledger.as_ref(), branch).await?;
            rows.extend(branch_rows(&branch.name, &window));
        }
        Ok(StatusReport { rows })
    }
}
