// src/ingest/normalize.rs
//! Turns one raw source record into a canonical `ArticleCandidate`, or a
//! `RejectReason` the orchestrator counts. Rejections never abort a batch.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;

use crate::config::SourceConfig;
use crate::ingest::mapping;
use crate::ingest::types::{ArticleCandidate, RejectReason};

pub fn normalize(
    record: &Value,
    config: &SourceConfig,
    requested_category: &str,
) -> Result<ArticleCandidate, RejectReason> {
    // Content is mandatory: sources returning stub/teaser records with no
    // body are dropped here.
    let content = resolve_string(record, config, "content")
        .filter(|s| !s.trim().is_empty())
        .ok_or(RejectReason::EmptyContent)?;

    // Without the natural key the upsert has nothing to key on.
    let title = resolve_string(record, config, "title")
        .filter(|s| !s.trim().is_empty())
        .ok_or(RejectReason::MissingField("title"))?;
    let source = resolve_string(record, config, "source")
        .filter(|s| !s.trim().is_empty())
        .ok_or(RejectReason::MissingField("source"))?;

    let author = resolve_string(record, config, "author");

    let published_at = resolve_string(record, config, "published_at")
        .and_then(|raw| parse_timestamp(&raw))
        .ok_or(RejectReason::BadTimestamp)?;

    let category = resolve_string(record, config, "category")
        .unwrap_or_else(|| requested_category.to_string());

    Ok(ArticleCandidate {
        title,
        content,
        author,
        source,
        published_at,
        category,
    })
}

fn resolve_string(record: &Value, config: &SourceConfig, field: &str) -> Option<String> {
    let spec = config.field_mapping.get(field)?;
    value_to_string(mapping::resolve(record, spec)?)
}

/// Scalars only: mapped fields are strings in practice, but some sources
/// hand back numbers (e.g. numeric ids used as source names).
fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Timestamp ladder: RFC 3339 → RFC 2822 → common naive layouts → bare date
/// (midnight UTC). Anything else is a per-record failure.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return DateTime::from_timestamp(dt.unix_timestamp(), 0);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
