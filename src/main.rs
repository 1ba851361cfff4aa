//! News Ingestion Pipeline — Trigger Binary
//! Fetches articles from the configured news APIs, normalizes them and
//! stores them. One-shot by default; `--daemon` keeps the daily schedule.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use article_ingest::{config, ingest, store::Store};

/// Fetch articles from a configured news source (or all of them).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Name of the configured source to fetch from, e.g. "newsapi.org"
    source: Option<String>,

    /// Fetch from every configured source
    #[arg(long)]
    all: bool,

    /// Restrict the run to these categories (repeatable; defaults to the
    /// configured list)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Path to the sources configuration file (TOML or JSON)
    #[arg(short, long, env = "NEWS_SOURCES_PATH")]
    config: Option<String>,

    /// SQLite database path
    #[arg(short, long, env = "NEWS_DB_PATH", default_value = "news.db")]
    database: String,

    /// Keep running, re-triggering ingestion on a schedule
    #[arg(long)]
    daemon: bool,

    /// Seconds between scheduled runs (with --daemon)
    #[arg(long, default_value_t = 86_400)]
    interval_secs: u64,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("article_ingest=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::load_from(Path::new(path))?,
        None => config::load_default()?,
    };

    let store = Store::open(&cli.database)?;
    store.seed_categories(&cfg.categories)?;

    if cli.daemon {
        tracing::info!(interval_secs = cli.interval_secs, "starting scheduler");
        ingest::scheduler::spawn_scheduler(cfg, store, cli.interval_secs).await?;
        return Ok(());
    }

    let source_names: Vec<String> = if cli.all {
        cfg.sources.keys().cloned().collect()
    } else if let Some(source) = cli.source.clone() {
        vec![source]
    } else {
        eprintln!("no source given; pass --all or one of:");
        for name in cfg.sources.keys() {
            eprintln!("  {name}");
        }
        std::process::exit(2);
    };

    let categories = if cli.categories.is_empty() {
        cfg.categories.clone()
    } else {
        cli.categories.clone()
    };

    let outcomes = ingest::run_once(&cfg, &store, &source_names, &categories).await;
    let fetched: usize = outcomes.iter().map(|o| o.fetched).sum();
    let saved: usize = outcomes.iter().map(|o| o.saved).sum();
    let skipped: usize = outcomes.iter().map(|o| o.skipped).sum();
    tracing::info!(
        pairs = outcomes.len(),
        fetched,
        saved,
        skipped,
        "ingestion run finished"
    );
    Ok(())
}
