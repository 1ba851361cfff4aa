// src/ingest/client.rs
//! One HTTP client per configured source. Transport failures never leave
//! this module: every failure path logs and yields an empty record list.

use anyhow::{Context, Result};
use metrics::counter;
use serde_json::Value;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::ingest::mapping;
use crate::ingest::rate_limit::FixedWindowLimiter;

pub const FETCH_TIMEOUT_SECS: u64 = 30;

pub struct SourceClient {
    config: SourceConfig,
    limiter: FixedWindowLimiter,
    mode: Mode,
}

enum Mode {
    Http { client: reqwest::Client },
    /// Canned response body instead of the HTTP call; used by tests.
    Fixture(Value),
}

impl SourceClient {
    pub fn new(config: SourceConfig, window_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .context("building http client")?;
        let limiter = FixedWindowLimiter::new(config.rate_limit, window_secs);
        Ok(Self {
            config,
            limiter,
            mode: Mode::Http { client },
        })
    }

    pub fn from_fixture(config: SourceConfig, body: Value, window_secs: u64) -> Self {
        let limiter = FixedWindowLimiter::new(config.rate_limit, window_secs);
        Self {
            config,
            limiter,
            mode: Mode::Fixture(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Fetch the raw records for one category. Rate-limit exhaustion and
    /// every transport failure return an empty list.
    pub async fn fetch(&self, category: &str) -> Vec<Value> {
        if !self.limiter.try_acquire() {
            tracing::debug!(
                source = %self.config.name,
                category,
                "rate limit window exhausted, skipping call"
            );
            counter!("ingest_rate_limited_total").increment(1);
            return Vec::new();
        }

        let body = match &self.mode {
            Mode::Fixture(body) => body.clone(),
            Mode::Http { client } => match self.get_json(client, category).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        source = %self.config.name,
                        category,
                        error = ?e,
                        "fetch failed"
                    );
                    counter!("ingest_fetch_errors_total").increment(1);
                    return Vec::new();
                }
            },
        };

        self.extract_list(&body)
    }

    async fn get_json(&self, client: &reqwest::Client, category: &str) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, self.config.endpoint);
        let query = build_query(&self.config, category);
        let response = client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("issuing request")?
            .error_for_status()
            .context("non-success status")?;
        response.json::<Value>().await.context("decoding json body")
    }

    fn extract_list(&self, body: &Value) -> Vec<Value> {
        match mapping::resolve_path(body, &self.config.list_key) {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                tracing::warn!(
                    source = %self.config.name,
                    list_key = %self.config.list_key,
                    "list key absent or not an array"
                );
                Vec::new()
            }
        }
    }
}

/// Static params plus the category under the source's search key.
fn build_query(config: &SourceConfig, category: &str) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = config
        .static_query_params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    query.push((config.search_param_key.clone(), category.to_string()));
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::mapping::PathSpec;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn test_config(list_key: &str) -> SourceConfig {
        let mut static_query_params = BTreeMap::new();
        static_query_params.insert("sortBy".into(), "popularity".into());
        let mut field_mapping = BTreeMap::new();
        field_mapping.insert("title".into(), PathSpec::from_path_str("title"));
        SourceConfig {
            name: "example.org".into(),
            base_url: "https://example.org/v1/".into(),
            endpoint: "search".into(),
            search_param_key: "q".into(),
            static_query_params,
            rate_limit: 10,
            list_key: list_key.into(),
            field_mapping,
        }
    }

    #[test]
    fn query_merges_static_params_with_category() {
        let query = build_query(&test_config("data"), "Tech");
        assert!(query.contains(&("sortBy".into(), "popularity".into())));
        assert!(query.contains(&("q".into(), "Tech".into())));
    }

    #[tokio::test]
    async fn fixture_fetch_extracts_nested_list() {
        let body = json!({
            "response": { "results": [ { "title": "one" }, { "title": "two" } ] }
        });
        let client = SourceClient::from_fixture(test_config("response.results"), body, 60);
        let records = client.fetch("Tech").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["title"], "one");
    }

    #[tokio::test]
    async fn absent_or_non_array_list_key_yields_empty() {
        let client =
            SourceClient::from_fixture(test_config("data"), json!({ "other": [] }), 60);
        assert!(client.fetch("Tech").await.is_empty());

        let client =
            SourceClient::from_fixture(test_config("data"), json!({ "data": "nope" }), 60);
        assert!(client.fetch("Tech").await.is_empty());
    }

    #[tokio::test]
    async fn exhausted_budget_yields_empty_without_a_call() {
        let mut config = test_config("data");
        config.rate_limit = 2;
        let body = json!({ "data": [ { "title": "x" } ] });
        let client = SourceClient::from_fixture(config, body, 3_600);

        assert_eq!(client.fetch("Tech").await.len(), 1);
        assert_eq!(client.fetch("Sports").await.len(), 1);
        // Budget spent: the remaining calls are skipped.
        assert!(client.fetch("Health").await.is_empty());
        assert!(client.fetch("Travel").await.is_empty());
    }
}
