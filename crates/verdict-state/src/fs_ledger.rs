//! Filesystem-backed verdict ledger.
//!
//! Layout: `<root>/{pass,fail,ignore}/<commit hash>`, where each file holds
//! the captured build log. Operators may mark a commit as ignored by
//! creating an empty file under `ignore/`.
//!
//! All file I/O runs on the blocking pool.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{
    check_record, resolve_partitions, validate_commit, LogDigest, StorageResult, Verdict,
    VerdictEntry, VerdictLedger,
};

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Verdict ledger stored as one directory per partition.
#[derive(Debug, Clone)]
pub struct FsVerdictLedger {
    root: PathBuf,
}

impl FsVerdictLedger {
    /// Create a ledger rooted at `root`. No I/O happens until
    /// [`VerdictLedger::ensure_partitions`] or the first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, verdict: Verdict) -> Option<PathBuf> {
        verdict.partition().map(|p| self.root.join(p))
    }

    fn entry_path(&self, verdict: Verdict, commit: &str) -> Option<PathBuf> {
        self.partition_dir(verdict).map(|d| d.join(commit))
    }

    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(FsVerdictLedger) -> StorageResult<T> + Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || op(ledger))
            .await
            .map_err(|e| StorageError::Backend(format!("ledger task failed: {e}")))?
    }

    fn found_in(&self, commit: &str) -> StorageResult<Vec<Verdict>> {
        let mut found = Vec::new();
        for verdict in Verdict::PARTITIONED {
            if let Some(path) = self.entry_path(verdict, commit) {
                if path.try_exists()? {
                    found.push(verdict);
                }
            }
        }
        Ok(found)
    }

    fn create_partitions(&self) -> StorageResult<()> {
        if !self.root.try_exists()? {
            self.create_root()?;
        }
        // Covers a root that existed without some of its partitions.
        for verdict in Verdict::PARTITIONED {
            if let Some(dir) = self.partition_dir(verdict) {
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    /// Build a fresh root with all partitions beside its final path and
    /// rename it into place, so the root never appears half populated.
    fn create_root(&self) -> StorageResult<()> {
        let (Some(name), Some(parent)) = (self.root.file_name(), self.root.parent()) else {
            return Ok(());
        };
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        fs::create_dir_all(parent)?;

        let staging = parent.join(format!(
            ".{}.{}.{}.partial",
            name.to_string_lossy(),
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let staged = Self::stage_partitions(&staging).and_then(|()| {
            fs::rename(&staging, &self.root).map_err(StorageError::from)
        });
        if let Err(e) = staged {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                debug!(path = %staging.display(), error = %cleanup, "staging dir not removed");
            }
            // Another writer created the root first.
            if !self.root.is_dir() {
                return Err(e);
            }
        }
        Ok(())
    }

    fn stage_partitions(staging: &Path) -> StorageResult<()> {
        fs::create_dir(staging)?;
        for verdict in Verdict::PARTITIONED {
            if let Some(p) = verdict.partition() {
                fs::create_dir(staging.join(p))?;
            }
        }
        Ok(())
    }

    fn read_verdict(&self, commit: &str) -> StorageResult<Verdict> {
        if validate_commit(commit).is_err() {
            return Ok(Verdict::Untested);
        }
        let found = self.found_in(commit)?;
        Ok(resolve_partitions(commit, &found))
    }

    fn write_verdict(&self, commit: &str, verdict: Verdict, log: &[u8]) -> StorageResult<()> {
        let existing = self.read_verdict(commit)?;
        if !check_record(commit, existing, verdict)? {
            debug!(commit = %commit, verdict = %verdict, "verdict already recorded");
            return Ok(());
        }

        self.create_partitions()?;
        let dir = self
            .partition_dir(verdict)
            .ok_or_else(|| StorageError::InvalidVerdict {
                commit: commit.to_string(),
                verdict: verdict.to_string(),
            })?;
        let path = dir.join(commit);

        // Write beside the target, then link into place without clobbering.
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(log)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                // Lost a race with another writer of the same commit.
                let now = self.read_verdict(commit)?;
                check_record(commit, now, verdict).map(|_| ())
            }
            Err(e) => Err(StorageError::Io(e.error)),
        }
    }

    fn read_entry(&self, commit: &str) -> StorageResult<Option<VerdictEntry>> {
        let verdict = self.read_verdict(commit)?;
        let Some(path) = self.entry_path(verdict, commit) else {
            return Ok(None);
        };

        let log = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };
        let recorded_at: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();

        Ok(Some(VerdictEntry {
            commit: commit.to_string(),
            verdict,
            log_digest: LogDigest::from_bytes(&log),
            log,
            recorded_at,
        }))
    }
}

#[async_trait]
impl VerdictLedger for FsVerdictLedger {
    async fn ensure_partitions(&self) -> StorageResult<()> {
        self.blocking(|ledger| ledger.create_partitions()).await?;
        debug!(root = %self.root.display(), "ledger partitions ready");
        Ok(())
    }

    async fn verdict(&self, commit: &str) -> StorageResult<Verdict> {
        let commit = commit.to_string();
        self.blocking(move |ledger| ledger.read_verdict(&commit)).await
    }

    async fn record(&self, commit: &str, verdict: Verdict, log: &[u8]) -> StorageResult<()> {
        let commit = commit.to_string();
        let log = log.to_vec();
        self.blocking(move |ledger| ledger.write_verdict(&commit, verdict, &log))
            .await
    }

    async fn entry(&self, commit: &str) -> StorageResult<Option<VerdictEntry>> {
        let commit = commit.to_string();
        self.blocking(move |ledger| ledger.read_entry(&commit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C1: &str = "1111111111111111111111111111111111111111";
    const C2: &str = "2222222222222222222222222222222222222222";

    fn make_ledger() -> (tempfile::TempDir, FsVerdictLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FsVerdictLedger::new(dir.path().join("out"));
        (dir, ledger)
    }

    #[tokio::test]
    async fn ensure_partitions_is_repeatable() {
        let (_dir, ledger) = make_ledger();
        ledger.ensure_partitions().await.unwrap();
        ledger.ensure_partitions().await.unwrap();
        for p in ["pass", "fail", "ignore"] {
            assert!(ledger.root().join(p).is_dir(), "{p} missing");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_creates_whole_root_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FsVerdictLedger::new(dir.path().join("nested").join("out"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.ensure_partitions().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut parts: Vec<_> = std::fs::read_dir(ledger.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        parts.sort();
        assert_eq!(parts, vec!["fail", "ignore", "pass"]);

        let siblings: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(siblings, vec![std::ffi::OsString::from("out")], "staging dirs left behind");
    }

    #[tokio::test]
    async fn existing_root_gets_missing_partitions() {
        let (_dir, ledger) = make_ledger();
        std::fs::create_dir_all(ledger.root().join("pass")).unwrap();
        ledger.ensure_partitions().await.unwrap();
        for p in ["pass", "fail", "ignore"] {
            assert!(ledger.root().join(p).is_dir(), "{p} missing");
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_writers_on_single_thread_runtime_keep_one_entry() {
        let (_dir, ledger) = make_ledger();
        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .record(C1, Verdict::Pass, format!("log {i}").as_bytes())
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.verdict(C1).await.unwrap(), Verdict::Pass);
        let files: Vec<_> = std::fs::read_dir(ledger.root().join("pass"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn missing_root_reads_as_untested() {
        let (_dir, ledger) = make_ledger();
        assert_eq!(ledger.verdict(C1).await.unwrap(), Verdict::Untested);
        assert!(ledger.entry(C1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_writes_log_under_partition() {
        let (_dir, ledger) = make_ledger();
        ledger.record(C1, Verdict::Fail, b"boom").await.unwrap();

        let path = ledger.root().join("fail").join(C1);
        assert_eq!(std::fs::read(path).unwrap(), b"boom");
        assert_eq!(ledger.verdict(C1).await.unwrap(), Verdict::Fail);

        let entry = ledger.entry(C1).await.unwrap().unwrap();
        assert_eq!(entry.log, b"boom");
        assert_eq!(entry.log_digest, LogDigest::from_bytes(b"boom"));
    }

    #[tokio::test]
    async fn record_same_verdict_twice_keeps_first_log() {
        let (_dir, ledger) = make_ledger();
        ledger.record(C1, Verdict::Pass, b"first").await.unwrap();
        ledger.record(C1, Verdict::Pass, b"second").await.unwrap();

        let entry = ledger.entry(C1).await.unwrap().unwrap();
        assert_eq!(entry.log, b"first");
        let files: Vec<_> = std::fs::read_dir(ledger.root().join("pass"))
            .unwrap()
            .collect();
        assert_eq!(files.len(), 1, "no temp files left behind");
    }

    #[tokio::test]
    async fn record_conflicting_verdict_is_rejected() {
        let (_dir, ledger) = make_ledger();
        ledger.record(C1, Verdict::Pass, b"ok").await.unwrap();
        let err = ledger.record(C1, Verdict::Fail, b"bad").await.unwrap_err();
        assert!(matches!(err, StorageError::VerdictConflict { .. }));
        assert!(!ledger.root().join("fail").join(C1).exists());
    }

    #[tokio::test]
    async fn hand_placed_ignore_marker_is_honoured() {
        let (_dir, ledger) = make_ledger();
        ledger.ensure_partitions().await.unwrap();
        std::fs::write(ledger.root().join("ignore").join(C2), b"").unwrap();
        assert_eq!(ledger.verdict(C2).await.unwrap(), Verdict::Ignore);
    }

    #[tokio::test]
    async fn corrupted_double_entry_resolves_to_pass() {
        let (_dir, ledger) = make_ledger();
        ledger.ensure_partitions().await.unwrap();
        std::fs::write(ledger.root().join("pass").join(C2), b"p").unwrap();
        std::fs::write(ledger.root().join("fail").join(C2), b"f").unwrap();
        assert_eq!(ledger.verdict(C2).await.unwrap(), Verdict::Pass);
    }

    #[tokio::test]
    async fn path_like_hash_is_untested_and_unrecordable() {
        let (_dir, ledger) = make_ledger();
        assert_eq!(ledger.verdict("../pass").await.unwrap(), Verdict::Untested);
        assert!(matches!(
            ledger.record("../pass", Verdict::Pass, b"").await,
            Err(StorageError::InvalidCommit { .. })
        ));
    }
}
