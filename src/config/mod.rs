// src/config/mod.rs
//! Source/category configuration: the data the whole pipeline is driven by.
//!
//! Loaded once at startup and immutable afterwards. Supports TOML or JSON,
//! resolved in order:
//! 1) `$NEWS_SOURCES_PATH`
//! 2) `config/sources.toml`
//! 3) `config/sources.json`

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::mapping::PathSpec;

const ENV_PATH: &str = "NEWS_SOURCES_PATH";

fn default_rate_limit() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    86_400
}

/// One third-party news API: call shape, rate budget and field mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source identifier, e.g. "newsapi.org". Filled from the map key
    /// at load time; explicit values in the file are overridden.
    #[serde(default)]
    pub name: String,
    pub base_url: String,
    pub endpoint: String,
    /// Query parameter carrying the requested category, e.g. "q".
    pub search_param_key: String,
    /// Fixed query parameters. Values support `{yesterday}` and `env:NAME`
    /// expansion at load time.
    #[serde(default)]
    pub static_query_params: BTreeMap<String, String>,
    /// Max calls per rate-limit window.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Dotted path locating the array of raw records in the response body.
    pub list_key: String,
    /// Canonical field name → path spec into a raw record.
    pub field_mapping: BTreeMap<String, PathSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Ordered category list each source is queried for.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Length of the per-source rate-limit window, seconds.
    #[serde(default = "default_window_secs")]
    pub rate_limit_window_secs: u64,
    pub sources: BTreeMap<String, SourceConfig>,
}

/// Load configuration from an explicit path (TOML or JSON by extension).
pub fn load_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    finalize(parse_config(&content, &ext)?)
}

/// Load configuration using the env var + fallback paths.
pub fn load_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    for candidate in ["config/sources.toml", "config/sources.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Err(anyhow!(
        "no sources configuration found (set {ENV_PATH} or provide config/sources.toml)"
    ))
}

fn parse_config(content: &str, hint_ext: &str) -> Result<IngestConfig> {
    // Try TOML first if hinted, JSON otherwise; fall back to the other.
    if hint_ext == "toml" {
        if let Ok(cfg) = toml::from_str(content) {
            return Ok(cfg);
        }
    }
    if let Ok(cfg) = serde_json::from_str(content) {
        return Ok(cfg);
    }
    toml::from_str(content).context("unsupported sources config format")
}

/// Fix up names and expand parameter placeholders. A source whose expansion
/// fails (typically a missing API-key env var) is dropped with an error log;
/// the load only fails when no usable source remains.
fn finalize(mut cfg: IngestConfig) -> Result<IngestConfig> {
    let mut unusable = Vec::new();
    for (name, source) in cfg.sources.iter_mut() {
        source.name = name.clone();
        if let Err(e) = expand_params(&mut source.static_query_params) {
            tracing::error!(source = %name, error = ?e, "dropping misconfigured source");
            unusable.push(name.clone());
        }
    }
    for name in unusable {
        cfg.sources.remove(&name);
    }
    if cfg.sources.is_empty() {
        return Err(anyhow!("no usable news sources configured"));
    }
    if cfg.categories.is_empty() {
        tracing::warn!("no categories configured; runs will be no-ops unless --category is given");
    }
    Ok(cfg)
}

fn expand_params(params: &mut BTreeMap<String, String>) -> Result<()> {
    for value in params.values_mut() {
        if value.contains("{yesterday}") {
            *value = value.replace("{yesterday}", &yesterday_utc());
        }
        if let Some(var) = value.strip_prefix("env:") {
            *value =
                std::env::var(var).with_context(|| format!("missing environment variable {var}"))?;
        }
    }
    Ok(())
}

fn yesterday_utc() -> String {
    (chrono::Utc::now() - chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}
