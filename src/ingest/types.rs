// src/ingest/types.rs
use chrono::{DateTime, Utc};

/// Canonical article shape every source is mapped into. Lives from
/// normalization until the upsert; the stored entity is `store::Article`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArticleCandidate {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub category: String,
}

/// Why the normalizer dropped a record. Rejections are values the
/// orchestrator counts, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Resolved content was null or empty (stub/teaser record).
    EmptyContent,
    /// The natural key (title, source) could not be resolved.
    MissingField(&'static str),
    /// `published_at` was absent or unparsable.
    BadTimestamp,
}

/// Terminal state of one (source, category) pair.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PairOutcome {
    pub source: String,
    pub category: String,
    pub fetched: usize,
    pub saved: usize,
    pub skipped: usize,
}
