// src/ingest/scheduler.rs
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::IngestConfig;
use crate::ingest::types::PairOutcome;
use crate::store::Store;

/// Run the full pipeline unless a previous run is still in flight; an
/// overlapping invocation is skipped entirely, never queued.
pub async fn run_guarded(
    cfg: &IngestConfig,
    store: &Store,
    in_flight: &Arc<AtomicBool>,
) -> Option<Vec<PairOutcome>> {
    if in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        tracing::warn!("ingestion run already in flight, skipping this invocation");
        counter!("ingest_runs_skipped_total").increment(1);
        return None;
    }
    let outcomes = crate::ingest::run_all(cfg, store).await;
    in_flight.store(false, Ordering::SeqCst);
    Some(outcomes)
}

/// Spawn the recurring trigger: one guarded run per interval tick.
pub fn spawn_scheduler(cfg: IngestConfig, store: Store, interval_secs: u64) -> JoinHandle<()> {
    let in_flight = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().timestamp().max(0) as u64;

            match run_guarded(&cfg, &store, &in_flight).await {
                Some(outcomes) => {
                    counter!("ingest_runs_total").increment(1);
                    gauge!("ingest_last_run_ts").set(now as f64);

                    let saved: usize = outcomes.iter().map(|o| o.saved).sum();
                    let skipped: usize = outcomes.iter().map(|o| o.skipped).sum();
                    tracing::info!(
                        target: "ingest",
                        pairs = outcomes.len(),
                        saved,
                        skipped,
                        "scheduled ingest tick"
                    );
                }
                None => {
                    tracing::info!(target: "ingest", "scheduled ingest tick skipped");
                }
            }
        }
    })
}
