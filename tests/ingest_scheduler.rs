// tests/ingest_scheduler.rs
use article_ingest::ingest::scheduler::run_guarded;
use article_ingest::{IngestConfig, Store};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn empty_cfg() -> IngestConfig {
    IngestConfig {
        categories: vec!["Tech".to_string()],
        rate_limit_window_secs: 3_600,
        sources: BTreeMap::new(),
    }
}

#[tokio::test]
async fn guarded_run_executes_when_idle_and_releases_the_guard() {
    let store = Store::open_in_memory().unwrap();
    let guard = Arc::new(AtomicBool::new(false));

    let first = run_guarded(&empty_cfg(), &store, &guard).await;
    assert!(first.is_some());
    assert!(!guard.load(Ordering::SeqCst), "guard must be released");

    let second = run_guarded(&empty_cfg(), &store, &guard).await;
    assert!(second.is_some());
}

#[tokio::test]
async fn overlapping_invocation_is_skipped_not_queued() {
    let store = Store::open_in_memory().unwrap();
    let guard = Arc::new(AtomicBool::new(false));

    // Simulate a run still in flight.
    guard.store(true, Ordering::SeqCst);
    let skipped = run_guarded(&empty_cfg(), &store, &guard).await;
    assert!(skipped.is_none());
    // The guard belongs to the in-flight run; skipping must not clear it.
    assert!(guard.load(Ordering::SeqCst));

    guard.store(false, Ordering::SeqCst);
    assert!(run_guarded(&empty_cfg(), &store, &guard).await.is_some());
}
