//! Trait contract tests for VerdictLedger.
//!
//! Every backend must pass the same behavioral contract. Each check is
//! written once against `&dyn VerdictLedger` and run against the in-memory
//! fake, the filesystem ledger and the in-memory SurrealDB ledger.

use verdict_state::fakes::MemoryVerdictLedger;
use verdict_state::{
    FsVerdictLedger, StorageError, SurrealVerdictLedger, Verdict, VerdictLedger,
};

const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const C: &str = "cccccccccccccccccccccccccccccccccccccccc";

async fn unknown_commit_is_untested(ledger: &dyn VerdictLedger) {
    assert_eq!(ledger.verdict(A).await.unwrap(), Verdict::Untested);
    assert!(ledger.entry(A).await.unwrap().is_none());
}

async fn record_then_read_back(ledger: &dyn VerdictLedger) {
    ledger.ensure_partitions().await.unwrap();
    ledger.record(A, Verdict::Pass, b"all green").await.unwrap();
    ledger.record(B, Verdict::Fail, b"test failed").await.unwrap();
    ledger.record(C, Verdict::Ignore, b"").await.unwrap();

    assert_eq!(ledger.verdict(A).await.unwrap(), Verdict::Pass);
    assert_eq!(ledger.verdict(B).await.unwrap(), Verdict::Fail);
    assert_eq!(ledger.verdict(C).await.unwrap(), Verdict::Ignore);
    assert!(ledger.is_pass(A).await.unwrap());
    assert!(ledger.is_fail(B).await.unwrap());
    assert!(!ledger.is_fail(A).await.unwrap());

    let entry = ledger.entry(B).await.unwrap().expect("fail entry");
    assert_eq!(entry.verdict, Verdict::Fail);
    assert_eq!(entry.log, b"test failed");
}

async fn record_is_idempotent(ledger: &dyn VerdictLedger) {
    ledger.record(A, Verdict::Fail, b"one").await.unwrap();
    ledger.record(A, Verdict::Fail, b"one").await.unwrap();
    assert_eq!(ledger.verdict(A).await.unwrap(), Verdict::Fail);
    assert_eq!(ledger.entry(A).await.unwrap().unwrap().log, b"one");
}

async fn verdicts_are_final(ledger: &dyn VerdictLedger) {
    ledger.record(A, Verdict::Pass, b"").await.unwrap();
    for other in [Verdict::Fail, Verdict::Ignore] {
        let err = ledger.record(A, other, b"").await.unwrap_err();
        assert!(
            matches!(err, StorageError::VerdictConflict { .. }),
            "expected conflict, got {err:?}"
        );
    }
    assert_eq!(ledger.verdict(A).await.unwrap(), Verdict::Pass);
}

async fn untested_cannot_be_recorded(ledger: &dyn VerdictLedger) {
    let err = ledger.record(A, Verdict::Untested, b"").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidVerdict { .. }));
}

async fn run_contract(ledger: &dyn VerdictLedger) {
    unknown_commit_is_untested(ledger).await;
    untested_cannot_be_recorded(ledger).await;
}

// ===========================================================================
// MemoryVerdictLedger
// ===========================================================================

#[tokio::test]
async fn memory_contract() {
    run_contract(&MemoryVerdictLedger::new()).await;
    record_then_read_back(&MemoryVerdictLedger::new()).await;
    record_is_idempotent(&MemoryVerdictLedger::new()).await;
    verdicts_are_final(&MemoryVerdictLedger::new()).await;
}

#[tokio::test]
async fn memory_idempotent_record_writes_once() {
    let ledger = MemoryVerdictLedger::new();
    ledger.record(A, Verdict::Pass, b"").await.unwrap();
    ledger.record(A, Verdict::Pass, b"").await.unwrap();
    assert_eq!(ledger.write_count(), 1);
}

#[tokio::test]
async fn memory_injected_ambiguity_resolves_deterministically() {
    let ledger = MemoryVerdictLedger::new();
    ledger.inject(A, Verdict::Fail);
    ledger.inject(A, Verdict::Pass);
    ledger.inject(B, Verdict::Ignore);
    ledger.inject(B, Verdict::Fail);

    assert_eq!(ledger.verdict(A).await.unwrap(), Verdict::Pass);
    assert_eq!(ledger.verdict(B).await.unwrap(), Verdict::Fail);
}

// ===========================================================================
// FsVerdictLedger
// ===========================================================================

fn fs_ledger() -> (tempfile::TempDir, FsVerdictLedger) {
    let dir = tempfile::tempdir().unwrap();
    let ledger = FsVerdictLedger::new(dir.path());
    (dir, ledger)
}

#[tokio::test]
async fn fs_contract() {
    let (_d1, l1) = fs_ledger();
    run_contract(&l1).await;
    let (_d2, l2) = fs_ledger();
    record_then_read_back(&l2).await;
    let (_d3, l3) = fs_ledger();
    record_is_idempotent(&l3).await;
    let (_d4, l4) = fs_ledger();
    verdicts_are_final(&l4).await;
}

#[tokio::test]
async fn fs_record_creates_partitions_on_demand() {
    let (dir, ledger) = fs_ledger();
    ledger.record(A, Verdict::Fail, b"x").await.unwrap();
    for p in ["pass", "fail", "ignore"] {
        assert!(dir.path().join(p).is_dir());
    }
}

#[tokio::test]
async fn fs_concurrent_ensure_partitions() {
    let (dir, ledger) = fs_ledger();
    let ledger = std::sync::Arc::new(ledger);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let l = ledger.clone();
        handles.push(tokio::spawn(async move { l.ensure_partitions().await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert!(dir.path().join("ignore").is_dir());
}

// ===========================================================================
// SurrealVerdictLedger
// ===========================================================================

#[tokio::test]
async fn surreal_contract() {
    run_contract(&SurrealVerdictLedger::in_memory().await.unwrap()).await;
    record_then_read_back(&SurrealVerdictLedger::in_memory().await.unwrap()).await;
    record_is_idempotent(&SurrealVerdictLedger::in_memory().await.unwrap()).await;
    verdicts_are_final(&SurrealVerdictLedger::in_memory().await.unwrap()).await;
}

#[tokio::test]
async fn surreal_ensure_partitions_is_repeatable() {
    let ledger = SurrealVerdictLedger::in_memory().await.unwrap();
    ledger.ensure_partitions().await.unwrap();
    ledger.ensure_partitions().await.unwrap();
    ledger.record(C, Verdict::Pass, b"ok").await.unwrap();
    assert_eq!(ledger.verdict(C).await.unwrap(), Verdict::Pass);
}
