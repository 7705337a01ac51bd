//! Storage trait definitions for the verdict ledger
//!
//! The ledger maps a commit hash to one of three disjoint partitions
//! (`pass`, `fail`, `ignore`). A commit absent from all three is
//! [`Verdict::Untested`]. Entries are append-only: once a commit has a
//! verdict it is never rewritten or removed.
//!
//! Backends:
//! - [`crate::FsVerdictLedger`]: one directory per partition, one file per commit
//! - [`crate::SurrealVerdictLedger`]: SurrealDB table with a unique commit index
//! - [`crate::fakes::MemoryVerdictLedger`]: in-memory, for tests

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;

use crate::error::StorageError;

/// Result type for ledger operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Build verdict for a single commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Ignore,
    Untested,
}

impl Verdict {
    /// Verdicts that own a partition, in lookup priority order.
    pub const PARTITIONED: [Verdict; 3] = [Verdict::Pass, Verdict::Fail, Verdict::Ignore];

    /// Partition name, or `None` for `Untested`.
    pub fn partition(&self) -> Option<&'static str> {
        match self {
            Verdict::Pass => Some("pass"),
            Verdict::Fail => Some("fail"),
            Verdict::Ignore => Some("ignore"),
            Verdict::Untested => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.partition().unwrap_or("untested")
    }

    /// Parse a partition name back into a verdict.
    pub fn from_partition(name: &str) -> Option<Verdict> {
        Verdict::PARTITIONED
            .into_iter()
            .find(|v| v.partition() == Some(name))
    }

    /// `true` for Pass and Fail, the verdicts a build can produce.
    pub fn is_built(&self) -> bool {
        matches!(self, Verdict::Pass | Verdict::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse the set of partitions a commit was found in to one verdict.
///
/// Data written through [`VerdictLedger::record`] lands in at most one
/// partition. Anything else is external corruption: resolved by priority
/// Pass > Fail > Ignore and logged.
pub fn resolve_partitions(commit: &str, found: &[Verdict]) -> Verdict {
    let resolved = Verdict::PARTITIONED
        .into_iter()
        .find(|v| found.contains(v))
        .unwrap_or(Verdict::Untested);

    if found.len() > 1 {
        warn!(
            event = "ledger.ambiguous",
            commit = %commit,
            partitions = ?found,
            resolved = %resolved,
            "commit present in more than one partition"
        );
    }

    resolved
}

/// Reject hashes that cannot name a git object (and could escape a
/// partition directory when used as a file name).
pub fn validate_commit(commit: &str) -> StorageResult<()> {
    let ok = (4..=64).contains(&commit.len()) && commit.chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidCommit {
            commit: commit.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// SHA-256 digest of a captured build log (hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogDigest(String);

impl LogDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        LogDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for LogDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored verdict together with its captured build output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictEntry {
    pub commit: String,
    pub verdict: Verdict,
    /// Combined stdout/stderr of the build (empty for most `ignore` entries)
    pub log: Vec<u8>,
    pub log_digest: LogDigest,
    pub recorded_at: DateTime<Utc>,
}

impl VerdictEntry {
    pub fn new(commit: impl Into<String>, verdict: Verdict, log: &[u8]) -> Self {
        Self {
            commit: commit.into(),
            verdict,
            log: log.to_vec(),
            log_digest: LogDigest::from_bytes(log),
            recorded_at: Utc::now(),
        }
    }

    /// Log as text, replacing invalid UTF-8.
    pub fn log_text(&self) -> String {
        String::from_utf8_lossy(&self.log).into_owned()
    }
}

// ---------------------------------------------------------------------------
// VerdictLedger
// ---------------------------------------------------------------------------

/// Persistent commit-hash → verdict store.
///
/// Guarantees:
/// - `verdict` never fails on ambiguous data; see [`resolve_partitions`].
/// - `record` is idempotent for the same (commit, verdict) pair.
/// - `record` refuses to move a commit into a different partition.
/// - `ensure_partitions` is safe to call repeatedly.
#[async_trait]
pub trait VerdictLedger: Send + Sync {
    /// Create the `pass`, `fail` and `ignore` partitions if absent.
    async fn ensure_partitions(&self) -> StorageResult<()>;

    /// Current verdict for `commit`. Unknown commits are `Untested`.
    async fn verdict(&self, commit: &str) -> StorageResult<Verdict>;

    /// Persist `verdict` for `commit` together with the captured build log.
    async fn record(&self, commit: &str, verdict: Verdict, log: &[u8]) -> StorageResult<()>;

    /// Stored entry for `commit`, if any.
    async fn entry(&self, commit: &str) -> StorageResult<Option<VerdictEntry>>;

    async fn is_pass(&self, commit: &str) -> StorageResult<bool> {
        Ok(self.verdict(commit).await? == Verdict::Pass)
    }

    async fn is_fail(&self, commit: &str) -> StorageResult<bool> {
        Ok(self.verdict(commit).await? == Verdict::Fail)
    }
}

/// Shared `record` precondition: decide whether a write is needed.
///
/// Returns `Ok(false)` when the commit already holds `requested`
/// (idempotent no-op), `Ok(true)` when it is untested, and a conflict
/// otherwise.
pub fn check_record(commit: &str, existing: Verdict, requested: Verdict) -> StorageResult<bool> {
    validate_commit(commit)?;
    if requested.partition().is_none() {
        return Err(StorageError::InvalidVerdict {
            commit: commit.to_string(),
            verdict: requested.to_string(),
        });
    }
    match existing {
        Verdict::Untested => Ok(true),
        v if v == requested => Ok(false),
        v => Err(StorageError::VerdictConflict {
            commit: commit.to_string(),
            existing: v.to_string(),
            requested: requested.to_string(),
        }),
    }
}
