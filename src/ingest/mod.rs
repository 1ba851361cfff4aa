// src/ingest/mod.rs
pub mod client;
pub mod mapping;
pub mod normalize;
pub mod rate_limit;
pub mod scheduler;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::config::IngestConfig;
use crate::ingest::client::SourceClient;
use crate::ingest::types::{ArticleCandidate, PairOutcome};
use crate::store::Store;

/// One-time metrics registration (so series show up on whatever exporter the
/// host process installs).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_articles_fetched_total",
            "Raw records fetched from source APIs."
        );
        describe_counter!(
            "ingest_articles_saved_total",
            "Articles persisted (inserted or updated)."
        );
        describe_counter!(
            "ingest_articles_skipped_total",
            "Records dropped by normalization or persistence."
        );
        describe_counter!("ingest_fetch_errors_total", "Source fetch/decode failures.");
        describe_counter!(
            "ingest_persist_errors_total",
            "Article upserts that failed at the storage layer."
        );
        describe_counter!(
            "ingest_rate_limited_total",
            "Fetch calls skipped because the source's window was exhausted."
        );
        describe_counter!("ingest_runs_total", "Completed ingestion runs.");
        describe_counter!(
            "ingest_runs_skipped_total",
            "Runs skipped by the overlap guard."
        );
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingestion last ran.");
    });
}

/// Run ingestion for the named sources across the given categories.
///
/// Sources run as independent tasks: their rate limiters are per-source and
/// upserts are idempotent on (title, source), so nothing contends. Failures
/// stay inside their (source, category) pair; the run itself never fails.
pub async fn run_once(
    cfg: &IngestConfig,
    store: &Store,
    source_names: &[String],
    categories: &[String],
) -> Vec<PairOutcome> {
    ensure_metrics_described();

    let mut handles = Vec::with_capacity(source_names.len());
    for name in source_names {
        let Some(source_cfg) = cfg.sources.get(name) else {
            tracing::error!(source = %name, "unknown source requested, skipping");
            continue;
        };
        let client = match SourceClient::new(source_cfg.clone(), cfg.rate_limit_window_secs) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(source = %name, error = ?e, "could not build source client");
                continue;
            }
        };
        let store = store.clone();
        let categories = categories.to_vec();
        handles.push(tokio::spawn(async move {
            run_source(client, &categories, &store).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(mut pair_outcomes) => outcomes.append(&mut pair_outcomes),
            Err(e) => tracing::error!(error = ?e, "source task panicked"),
        }
    }

    gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
    outcomes
}

/// Convenience wrapper: every configured source, the configured categories.
pub async fn run_all(cfg: &IngestConfig, store: &Store) -> Vec<PairOutcome> {
    let source_names: Vec<String> = cfg.sources.keys().cloned().collect();
    run_once(cfg, store, &source_names, &cfg.categories).await
}

/// One source across its category list. Categories run sequentially against
/// the source's shared rate limiter.
pub async fn run_source(
    client: SourceClient,
    categories: &[String],
    store: &Store,
) -> Vec<PairOutcome> {
    let mut outcomes = Vec::with_capacity(categories.len());
    for category in categories {
        let outcome = run_pair(&client, category, store).await;
        tracing::info!(
            source = %outcome.source,
            category = %outcome.category,
            fetched = outcome.fetched,
            saved = outcome.saved,
            skipped = outcome.skipped,
            "pair completed"
        );
        outcomes.push(outcome);
    }
    outcomes
}

async fn run_pair(client: &SourceClient, category: &str, store: &Store) -> PairOutcome {
    let records = client.fetch(category).await;
    let fetched = records.len();
    counter!("ingest_articles_fetched_total").increment(fetched as u64);

    let mut saved = 0usize;
    let mut skipped = 0usize;
    for record in &records {
        match normalize::normalize(record, client.config(), category) {
            Ok(candidate) => match persist(store, &candidate) {
                Ok(()) => {
                    saved += 1;
                    counter!("ingest_articles_saved_total").increment(1);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        source = %client.name(),
                        category,
                        title = %candidate.title,
                        error = ?e,
                        "failed to persist article"
                    );
                    counter!("ingest_persist_errors_total").increment(1);
                    counter!("ingest_articles_skipped_total").increment(1);
                }
            },
            Err(reason) => {
                skipped += 1;
                tracing::debug!(
                    source = %client.name(),
                    category,
                    reason = ?reason,
                    "record rejected"
                );
                counter!("ingest_articles_skipped_total").increment(1);
            }
        }
    }

    PairOutcome {
        source: client.name().to_string(),
        category: category.to_string(),
        fetched,
        saved,
        skipped,
    }
}

/// Category row first, then the upsert referencing it.
fn persist(store: &Store, candidate: &ArticleCandidate) -> anyhow::Result<()> {
    let category_id = store.category_id(&candidate.category)?;
    store.upsert_article(candidate, category_id)
}
