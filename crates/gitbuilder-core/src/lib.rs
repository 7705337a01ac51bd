//! gitbuilder core library
//!
//! Scheduling, fault localization and status reporting over a verdict
//! ledger. Version control is reached only through the traits in [`vcs`];
//! [`git::GitCli`] is the production implementation and [`fakes::FakeRepo`]
//! the in-memory one.

pub mod bisect;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod git;
pub mod obs;
pub mod report;
pub mod scheduler;
pub mod telemetry;
pub mod vcs;

pub use bisect::FaultLocalizer;
pub use config::{BranchFilter, BuilderConfig, LedgerBackend, DEFAULT_BUILD_TIMEOUT_SECS};
pub use domain::{
    Branch, BuilderError, Commit, Result, RevisionWindow, WindowEntry, SHORT_HASH_LEN,
};
pub use git::GitCli;
pub use obs::CycleSpan;
pub use report::{branch_rows, BranchStatus, ReportGenerator, ReportRow, StatusReport};
pub use scheduler::{plan, Plan, Scheduler};
pub use telemetry::init_tracing;
pub use vcs::{BisectionOracle, HistoryProvider, WorkingTreeController};

pub use verdict_state::{Verdict, VerdictLedger};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
