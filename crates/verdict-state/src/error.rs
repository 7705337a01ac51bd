//! Error types for verdict-state

use thiserror::Error;

/// Errors that can occur in the verdict ledger
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem error while reading or writing a partition
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    /// Database backend error
    #[error("ledger backend error: {0}")]
    Backend(String),

    /// Attempted to record a verdict that has no partition (e.g. `Untested`)
    #[error("cannot record verdict {verdict} for commit {commit}")]
    InvalidVerdict { commit: String, verdict: String },

    /// Commit already carries a different verdict; verdicts are final
    #[error("commit {commit} already recorded as {existing}, refusing to record {requested}")]
    VerdictConflict {
        commit: String,
        existing: String,
        requested: String,
    },

    /// Commit hash is empty or not a plain hex object name
    #[error("invalid commit hash: {commit:?}")]
    InvalidCommit { commit: String },

    /// Stored entry could not be decoded
    #[error("corrupt ledger entry for {commit}: {reason}")]
    Corrupt { commit: String, reason: String },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(format!("serialization failed: {err}"))
    }
}
