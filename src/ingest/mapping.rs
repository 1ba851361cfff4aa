// src/ingest/mapping.rs
//! Declarative field mapping for heterogeneous source payloads.
//!
//! Every source describes where each canonical article field lives inside its
//! response records as a `PathSpec`:
//!
//! - `"source.name"` — a single dotted path (array indices are valid
//!   segments, e.g. `"creator.0"`);
//! - `"content|description"` — a fallback chain, first non-null wins;
//! - `{ path = "url", transform = "extract-domain" }` — a path (or chain)
//!   whose resolved value is passed through a named transform.
//!
//! Resolution never fails: a missing segment, an out-of-range index or a JSON
//! `null` all resolve to `None`.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Closed registry of value transforms referenced by name from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transform {
    /// `"http://www.example.com/a"` → `"example.com"`.
    ExtractDomain,
    /// Decode HTML entities, drop tags, collapse whitespace.
    StripHtml,
    Trim,
}

impl Transform {
    /// Apply the transform. Transforms operate on strings; any other value
    /// passes through unchanged.
    pub fn apply(&self, value: Value) -> Value {
        let Value::String(s) = value else {
            return value;
        };
        let out = match self {
            Transform::ExtractDomain => extract_domain(&s),
            Transform::StripHtml => strip_html(&s),
            Transform::Trim => s.trim().to_string(),
        };
        Value::String(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSpec {
    Single(String),
    Fallback(Vec<String>),
    Transformed {
        inner: Box<PathSpec>,
        transform: Transform,
    },
}

impl PathSpec {
    /// Parse the string form of the DSL: pipe-delimited paths become a
    /// fallback chain, anything else a single path.
    pub fn from_path_str(raw: &str) -> Self {
        let parts: Vec<String> = raw
            .split('|')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() == 1 {
            PathSpec::Single(parts.into_iter().next().unwrap_or_default())
        } else {
            PathSpec::Fallback(parts)
        }
    }

    fn path_str(&self) -> String {
        match self {
            PathSpec::Single(p) => p.clone(),
            PathSpec::Fallback(ps) => ps.join("|"),
            PathSpec::Transformed { inner, .. } => inner.path_str(),
        }
    }
}

// The DSL round-trips: plain specs as strings, transformed specs as
// `{ path, transform }` tables.
impl Serialize for PathSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathSpec::Single(_) | PathSpec::Fallback(_) => {
                serializer.serialize_str(&self.path_str())
            }
            PathSpec::Transformed { transform, .. } => {
                #[derive(Serialize)]
                struct Repr<'a> {
                    path: String,
                    transform: &'a Transform,
                }
                Repr {
                    path: self.path_str(),
                    transform,
                }
                .serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for PathSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Plain(String),
            WithTransform { path: String, transform: Transform },
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Plain(s) => PathSpec::from_path_str(&s),
            Repr::WithTransform { path, transform } => PathSpec::Transformed {
                inner: Box::new(PathSpec::from_path_str(&path)),
                transform,
            },
        })
    }
}

/// Resolve a `PathSpec` against one raw record. `None` means "absent": no
/// matching path, or the value was JSON `null`.
pub fn resolve(record: &Value, spec: &PathSpec) -> Option<Value> {
    match spec {
        PathSpec::Single(path) => resolve_path(record, path).cloned(),
        PathSpec::Fallback(paths) => paths.iter().find_map(|p| resolve_path(record, p).cloned()),
        PathSpec::Transformed { inner, transform } => {
            resolve(record, inner).map(|v| transform.apply(v))
        }
    }
}

/// Walk one dotted path. Lookup short-circuits on the first missing link;
/// a final `null` is reported as absent.
pub fn resolve_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn extract_domain(raw: &str) -> String {
    if let Ok(parsed) = url::Url::parse(raw) {
        if let Some(host) = parsed.host_str() {
            return host.trim_start_matches("www.").to_string();
        }
    }
    // Not an absolute URL; still strip a leading www.
    raw.trim_start_matches("www.").to_string()
}

fn strip_html(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&decoded, " ");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}
