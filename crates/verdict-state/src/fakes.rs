//! In-memory fakes for the ledger trait (testing only)
//!
//! `MemoryVerdictLedger` satisfies the [`VerdictLedger`] contract without
//! touching disk. [`MemoryVerdictLedger::inject`] bypasses the exclusivity
//! check so tests can simulate a corrupted ledger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::storage_traits::*;

/// In-memory verdict ledger backed by `HashMap<commit, entries>`.
#[derive(Debug, Default)]
pub struct MemoryVerdictLedger {
    entries: Mutex<HashMap<String, Vec<VerdictEntry>>>,
    partitions_ready: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryVerdictLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed verdicts without going through `record`.
    pub fn with_verdicts<'a>(pairs: impl IntoIterator<Item = (&'a str, Verdict)>) -> Self {
        let ledger = Self::new();
        for (commit, verdict) in pairs {
            ledger.inject(commit, verdict);
        }
        ledger
    }

    /// Insert an entry unconditionally, even if the commit already sits in
    /// another partition.
    pub fn inject(&self, commit: &str, verdict: Verdict) {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(commit.to_string())
            .or_default()
            .push(VerdictEntry::new(commit, verdict, b""));
    }

    /// Whether `ensure_partitions` has been called.
    pub fn partitions_ready(&self) -> bool {
        self.partitions_ready.load(Ordering::SeqCst)
    }

    /// Number of entries actually written through `record`.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn found_in(&self, commit: &str) -> Vec<Verdict> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(commit)
            .map(|list| list.iter().map(|e| e.verdict).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VerdictLedger for MemoryVerdictLedger {
    async fn ensure_partitions(&self) -> StorageResult<()> {
        self.partitions_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn verdict(&self, commit: &str) -> StorageResult<Verdict> {
        Ok(resolve_partitions(commit, &self.found_in(commit)))
    }

    async fn record(&self, commit: &str, verdict: Verdict, log: &[u8]) -> StorageResult<()> {
        let existing = self.verdict(commit).await?;
        if !check_record(commit, existing, verdict)? {
            return Ok(());
        }
        self.partitions_ready.store(true, Ordering::SeqCst);
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(commit.to_string())
            .or_default()
            .push(VerdictEntry::new(commit, verdict, log));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn entry(&self, commit: &str) -> StorageResult<Option<VerdictEntry>> {
        let verdict = self.verdict(commit).await?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(commit)
            .and_then(|list| list.iter().find(|e| e.verdict == verdict).cloned()))
    }
}
