//! gitbuilder CI: build execution and the scheduling cycle.
//!
//! - [`BuildRunner`] runs the build script with a deadline and kills its
//!   process group when done
//! - [`BuildExecutor`] checks out a commit, builds it and records the verdict
//! - [`BuildCycle`] schedules every tracked branch and produces the report

pub mod command;
pub mod cycle;
mod error;
pub mod executor;
pub mod runner;

pub use command::BuildCommand;
pub use cycle::{BuildCycle, CycleResult, CycleSummary};
pub use error::{BuildError, Result};
pub use executor::{BuildExecutor, BuildOutcome};
pub use runner::{BuildRunner, RunOutput};
