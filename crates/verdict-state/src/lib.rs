//! Verdict-State: the build verdict ledger for gitbuilder
//!
//! Maps commit hashes to build verdicts. Three disjoint partitions
//! (`pass`, `fail`, `ignore`) hold entries; a commit in none of them is
//! untested. Entries are final once written.
//!
//! ## Layer 0 - Data/Persistence
//!
//! ## Key Components
//!
//! - `VerdictLedger`: async, backend-agnostic ledger trait
//! - `FsVerdictLedger`: directory-per-partition store (default)
//! - `SurrealVerdictLedger`: SurrealDB/SurrealKV store
//! - `fakes::MemoryVerdictLedger`: in-memory store for tests

mod error;
pub mod fakes;
mod fs_ledger;
pub mod migrations;
pub mod storage_traits;
pub mod surreal_ledger;

pub use error::StorageError;
pub use fs_ledger::FsVerdictLedger;
pub use storage_traits::{
    resolve_partitions, validate_commit, LogDigest, StorageResult, Verdict, VerdictEntry,
    VerdictLedger,
};
pub use surreal_ledger::SurrealVerdictLedger;
