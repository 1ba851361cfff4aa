// tests/ingest_partial_failure.rs
//
// A single malformed record must never abort its batch.

use article_ingest::ingest::client::SourceClient;
use article_ingest::ingest::mapping::PathSpec;
use article_ingest::{ingest, SourceConfig, Store};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn newsapi_like_config() -> SourceConfig {
    let mut field_mapping = BTreeMap::new();
    field_mapping.insert("title".into(), PathSpec::from_path_str("title"));
    field_mapping.insert(
        "content".into(),
        PathSpec::from_path_str("content|description"),
    );
    field_mapping.insert("author".into(), PathSpec::from_path_str("author"));
    field_mapping.insert("source".into(), PathSpec::from_path_str("source.name"));
    field_mapping.insert("published_at".into(), PathSpec::from_path_str("publishedAt"));
    SourceConfig {
        name: "newsapi.org".into(),
        base_url: "https://newsapi.org/v2/".into(),
        endpoint: "everything".into(),
        search_param_key: "q".into(),
        static_query_params: BTreeMap::new(),
        rate_limit: 30,
        list_key: "articles".into(),
        field_mapping,
    }
}

fn record(i: usize, published_at: &str) -> Value {
    json!({
        "title": format!("Title {i}"),
        "content": format!("Body {i}"),
        "author": "Jo",
        "source": { "name": "Example Wire" },
        "publishedAt": published_at,
    })
}

#[tokio::test]
async fn one_bad_date_skips_one_record_not_the_batch() {
    let mut articles = Vec::new();
    for i in 0..10 {
        let published_at = if i == 4 {
            "not a timestamp"
        } else {
            "2024-11-20T08:30:00Z"
        };
        articles.push(record(i, published_at));
    }
    let body = json!({ "articles": articles });

    let store = Store::open_in_memory().unwrap();
    let client = SourceClient::from_fixture(newsapi_like_config(), body, 3_600);
    let outcomes = ingest::run_source(client, &["Tech".to_string()], &store).await;

    assert_eq!(outcomes[0].fetched, 10);
    assert_eq!(outcomes[0].saved, 9);
    assert_eq!(outcomes[0].skipped, 1);
    assert_eq!(store.article_count().unwrap(), 9);
    assert!(store.find_article("Title 4", "Example Wire").unwrap().is_none());
    assert!(store.find_article("Title 5", "Example Wire").unwrap().is_some());
}

#[tokio::test]
async fn stub_records_without_content_are_dropped() {
    let mut stub = record(0, "2024-11-20T08:30:00Z");
    stub["content"] = Value::Null;
    stub["description"] = Value::Null;
    let body = json!({ "articles": [stub, record(1, "2024-11-20T08:30:00Z")] });

    let store = Store::open_in_memory().unwrap();
    let client = SourceClient::from_fixture(newsapi_like_config(), body, 3_600);
    let outcomes = ingest::run_source(client, &["Tech".to_string()], &store).await;

    assert_eq!(outcomes[0].saved, 1);
    assert_eq!(outcomes[0].skipped, 1);
    assert_eq!(store.article_count().unwrap(), 1);
}

#[tokio::test]
async fn content_fallback_rescues_records_with_description_only() {
    let mut teaser = record(0, "2024-11-20T08:30:00Z");
    teaser["content"] = Value::Null;
    teaser["description"] = json!("short description");
    let body = json!({ "articles": [teaser] });

    let store = Store::open_in_memory().unwrap();
    let client = SourceClient::from_fixture(newsapi_like_config(), body, 3_600);
    ingest::run_source(client, &["Tech".to_string()], &store).await;

    let article = store.find_article("Title 0", "Example Wire").unwrap().unwrap();
    assert_eq!(article.content, "short description");
}
