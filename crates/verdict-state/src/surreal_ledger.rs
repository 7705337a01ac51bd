//! SurrealDB-backed verdict ledger
//!
//! Rows live in the `verdicts` table (see [`crate::migrations`]). The
//! partition is the row's `verdict` column; the unique `commit_hash` index
//! enforces exclusivity at the storage layer.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::migrations;
use crate::storage_traits::{
    check_record, resolve_partitions, validate_commit, LogDigest, StorageResult, Verdict,
    VerdictEntry, VerdictLedger,
};

const NAMESPACE: &str = "gitbuilder";
const DATABASE: &str = "ledger";

/// Row shape of the `verdicts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbVerdict {
    commit_hash: String,
    verdict: String,
    log: String,
    log_digest: String,
    recorded_at: String,
}

impl DbVerdict {
    fn from_entry(entry: &VerdictEntry) -> Self {
        Self {
            commit_hash: entry.commit.clone(),
            verdict: entry.verdict.as_str().to_string(),
            log: entry.log_text(),
            log_digest: entry.log_digest.as_str().to_string(),
            recorded_at: entry.recorded_at.to_rfc3339(),
        }
    }

    fn into_entry(self) -> StorageResult<VerdictEntry> {
        let verdict =
            Verdict::from_partition(&self.verdict).ok_or_else(|| StorageError::Corrupt {
                commit: self.commit_hash.clone(),
                reason: format!("unknown verdict {:?}", self.verdict),
            })?;
        let recorded_at = DateTime::parse_from_rfc3339(&self.recorded_at)
            .map_err(|e| StorageError::Corrupt {
                commit: self.commit_hash.clone(),
                reason: format!("bad timestamp: {e}"),
            })?
            .with_timezone(&Utc);
        let log = self.log.into_bytes();

        Ok(VerdictEntry {
            commit: self.commit_hash,
            verdict,
            log_digest: LogDigest::from_bytes(&log),
            log,
            recorded_at,
        })
    }
}

/// SurrealDB-backed implementation of [`VerdictLedger`].
pub struct SurrealVerdictLedger {
    db: Surreal<Any>,
}

impl SurrealVerdictLedger {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        let ledger = Self::connect("mem://").await?;
        info!("SurrealVerdictLedger connected (in-memory)");
        Ok(ledger)
    }

    /// Open (or create) an on-disk SurrealKV ledger at `path`.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let url = format!("surrealkv://{}", path.display());
        let ledger = Self::connect(&url).await?;
        info!(url = %url, "SurrealVerdictLedger connected");
        Ok(ledger)
    }

    async fn connect(url: &str) -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE).use_db(DATABASE).await?;

        migrations::init_schema(&db).await?;
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_rows(&self, commit: &str) -> StorageResult<Vec<DbVerdict>> {
        let commit_owned = commit.to_string();
        let mut res = self
            .db
            .query(
                "SELECT commit_hash, verdict, log, log_digest, recorded_at \
                 FROM verdicts WHERE commit_hash = $commit",
            )
            .bind(("commit", commit_owned))
            .await?;

        let rows: Vec<DbVerdict> = res.take(0)?;
        Ok(rows)
    }
}

#[async_trait]
impl VerdictLedger for SurrealVerdictLedger {
    async fn ensure_partitions(&self) -> StorageResult<()> {
        migrations::init_schema(&self.db).await
    }

    async fn verdict(&self, commit: &str) -> StorageResult<Verdict> {
        if validate_commit(commit).is_err() {
            return Ok(Verdict::Untested);
        }
        let found: Vec<Verdict> = self
            .fetch_rows(commit)
            .await?
            .iter()
            .filter_map(|row| Verdict::from_partition(&row.verdict))
            .collect();
        Ok(resolve_partitions(commit, &found))
    }

    async fn record(&self, commit: &str, verdict: Verdict, log: &[u8]) -> StorageResult<()> {
        let existing = self.verdict(commit).await?;
        if !check_record(commit, existing, verdict)? {
            debug!(commit = %commit, verdict = %verdict, "verdict already recorded");
            return Ok(());
        }

        let row = DbVerdict::from_entry(&VerdictEntry::new(commit, verdict, log));
        debug!(commit = %commit, verdict = %verdict, "recording verdict");

        let outcome = self
            .db
            .query("CREATE verdicts CONTENT $row")
            .bind(("row", row))
            .await
            .and_then(|res| res.check());

        if let Err(e) = outcome {
            // Unique index rejected the row if another writer got there first.
            let now = self.verdict(commit).await?;
            if now == Verdict::Untested {
                return Err(e.into());
            }
            check_record(commit, now, verdict)?;
        }
        Ok(())
    }

    async fn entry(&self, commit: &str) -> StorageResult<Option<VerdictEntry>> {
        let verdict = self.verdict(commit).await?;
        if verdict == Verdict::Untested {
            return Ok(None);
        }
        self.fetch_rows(commit)
            .await?
            .into_iter()
            .find(|row| row.verdict == verdict.as_str())
            .map(DbVerdict::into_entry)
            .transpose()
    }
}
