//! SurrealDB schema for the verdict ledger
//!
//! Every statement uses `IF NOT EXISTS`, so initialization is idempotent and
//! doubles as the SurrealDB form of `ensure_partitions`.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::storage_traits::StorageResult;

/// Initialize all ledger tables.
pub async fn init_schema(db: &Surreal<Any>) -> StorageResult<()> {
    info!("Initializing verdict ledger schema");
    init_verdicts_table(db).await?;
    info!("Verdict ledger schema ready");
    Ok(())
}

/// Initialize `verdicts` table
///
/// Schema:
/// ```text
/// TABLE verdicts {
///   commit_hash:  STRING (unique)
///   verdict:      STRING (enum: pass | fail | ignore)
///   log:          STRING (captured build output)
///   log_digest:   STRING (sha256 hex of log)
///   recorded_at:  STRING (RFC 3339)
/// }
/// ```
///
/// The unique index on `commit_hash` keeps the three partitions disjoint;
/// update and delete are denied so verdicts stay final.
async fn init_verdicts_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing verdicts table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS verdicts
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_commit_hash ON TABLE verdicts COLUMNS commit_hash UNIQUE;

        DEFINE INDEX IF NOT EXISTS idx_verdict ON TABLE verdicts COLUMNS verdict;
    "#;

    db.query(sql).await?.check()?;
    debug!("verdicts table initialized");
    Ok(())
}
