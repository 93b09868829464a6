//! Elasticsearch-compatible document store over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{NearbyError, Result};
use crate::query::Query;
use crate::store::{CollectionSchema, DocumentStore, Hit, SearchHits};

fn default_url() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Configuration for [`ElasticDocumentStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticDocumentStoreConfig {
    /// Base URL of the cluster, e.g. `http://127.0.0.1:9200`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-request timeout of the HTTP client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ask the cluster to refresh after each write so it is searchable
    /// immediately. Off by default; useful for demos and smoke tests.
    #[serde(default)]
    pub refresh: bool,
}

impl Default for ElasticDocumentStoreConfig {
    fn default() -> Self {
        ElasticDocumentStoreConfig {
            url: default_url(),
            timeout_secs: default_timeout_secs(),
            refresh: false,
        }
    }
}

/// A [`DocumentStore`] backed by an Elasticsearch-compatible REST API.
#[derive(Debug, Clone)]
pub struct ElasticDocumentStore {
    /// HTTP client for making API requests.
    client: Client,
    /// Cluster base URL.
    base: Url,
    refresh: bool,
}

impl ElasticDocumentStore {
    pub fn new(config: ElasticDocumentStoreConfig) -> Result<Self> {
        let base = Url::parse(&config.url).map_err(|e| {
            NearbyError::config(format!("invalid document store url '{}': {e}", config.url))
        })?;
        if base.cannot_be_a_base() {
            return Err(NearbyError::config(format!(
                "document store url '{}' cannot be used as a base",
                config.url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(ElasticDocumentStore {
            client,
            base,
            refresh: config.refresh,
        })
    }

    /// Build `{base}/{segments...}` with every segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| NearbyError::config("document store url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the status with the raw body text.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String)> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| NearbyError::document_store(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            NearbyError::document_store(format!("failed to read response text: {e}"))
        })?;
        Ok((status, text))
    }
}

#[async_trait]
impl DocumentStore for ElasticDocumentStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<bool> {
        let url = self.endpoint(&[schema.name()])?;
        let (status, _) = self.send(Method::HEAD, url.clone(), None).await?;
        match status {
            s if s.is_success() => return Ok(false),
            StatusCode::NOT_FOUND => {}
            s => {
                return Err(NearbyError::document_store(format!(
                    "checking collection {} failed with status {s}",
                    schema.name()
                )));
            }
        }

        let (status, text) = self.send(Method::PUT, url, Some(&schema.to_mapping())).await?;
        if status.is_success() {
            return Ok(true);
        }
        // Another instance may have created it between the check and the put.
        if status == StatusCode::BAD_REQUEST && text.contains("resource_already_exists_exception") {
            return Ok(false);
        }
        Err(NearbyError::document_store(format!(
            "creating collection {} failed (status {status}): {text}",
            schema.name()
        )))
    }

    async fn upsert(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        let mut url = self.endpoint(&[collection, "_doc", id])?;
        if self.refresh {
            url.query_pairs_mut().append_pair("refresh", "true");
        }

        let (status, text) = self.send(Method::PUT, url, Some(&document)).await?;
        if !status.is_success() {
            return Err(NearbyError::document_store(format!(
                "indexing {collection}/{id} failed (status {status}): {text}"
            )));
        }
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, document: Value) -> Result<bool> {
        let mut url = self.endpoint(&[collection, "_create", id])?;
        if self.refresh {
            url.query_pairs_mut().append_pair("refresh", "true");
        }

        let (status, text) = self.send(Method::PUT, url, Some(&document)).await?;
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::CONFLICT => Ok(false),
            s => Err(NearbyError::document_store(format!(
                "creating {collection}/{id} failed (status {s}): {text}"
            ))),
        }
    }

    async fn search(&self, collection: &str, query: &Query, limit: usize) -> Result<SearchHits> {
        let url = self.endpoint(&[collection, "_search"])?;
        let body = json!({
            "query": query.to_dsl(),
            "size": limit,
        });

        let (status, text) = self.send(Method::POST, url, Some(&body)).await?;
        if status == StatusCode::BAD_REQUEST {
            return Err(NearbyError::query(format!(
                "{} rejected: {text}",
                query.description()
            )));
        }
        if !status.is_success() {
            return Err(NearbyError::document_store(format!(
                "search on {collection} failed (status {status}): {text}"
            )));
        }

        let response: Value = serde_json::from_str(&text).map_err(|e| {
            NearbyError::document_store(format!("failed to parse search response: {e}"))
        })?;
        parse_search_response(&response)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut url = self.endpoint(&[collection, "_doc", id])?;
        if self.refresh {
            url.query_pairs_mut().append_pair("refresh", "true");
        }

        let (status, text) = self.send(Method::DELETE, url, None).await?;
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(NearbyError::document_store(format!(
                "deleting {collection}/{id} failed (status {s}): {text}"
            ))),
        }
    }
}

/// Extract hits from a `_search` response body.
///
/// `hits.total` may be a plain number or a `{"value": n}` object depending
/// on the server version. Hits without an `_id` are dropped; a missing
/// `_source` is kept as `null` and left for the caller to reject.
pub fn parse_search_response(response: &Value) -> Result<SearchHits> {
    let section = response
        .get("hits")
        .ok_or_else(|| NearbyError::document_store("search response has no hits"))?;

    let items = section
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| NearbyError::document_store("search response has no hits array"))?;

    let hits: Vec<Hit> = items
        .iter()
        .filter_map(|item| {
            let id = item.get("_id")?.as_str()?.to_string();
            let source = item.get("_source").cloned().unwrap_or(Value::Null);
            Some(Hit { id, source })
        })
        .collect();

    let total = match section.get("total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(t)) => t.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .unwrap_or(hits.len() as u64);

    Ok(SearchHits { total, hits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::routing::put;
    use axum::{Json, Router};
    use parking_lot::Mutex;

    #[test]
    fn test_parse_search_response() {
        let response = json!({
            "took": 3,
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {"_index": "post", "_id": "a", "_source": {"kind": "post", "id": "a"}},
                    {"_index": "post", "_id": "b"}
                ]
            }
        });
        let hits = parse_search_response(&response).unwrap();
        assert_eq!(hits.total, 2);
        assert_eq!(hits.hits[0].id, "a");
        assert_eq!(hits.hits[0].source["id"], "a");
        assert_eq!(hits.hits[1].source, Value::Null);
    }

    #[test]
    fn test_parse_legacy_total() {
        let response = json!({"hits": {"total": 7, "hits": []}});
        let hits = parse_search_response(&response).unwrap();
        assert_eq!(hits.total, 7);
        assert!(hits.hits.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(parse_search_response(&json!({"error": "boom"})).is_err());
        assert!(parse_search_response(&json!({"hits": {"total": 0}})).is_err());
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let store = ElasticDocumentStore::new(ElasticDocumentStoreConfig {
            url: "http://es.local:9200/".to_string(),
            ..Default::default()
        })
        .unwrap();
        let url = store.endpoint(&["post", "_doc", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://es.local:9200/post/_doc/a%20b%2Fc");
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let err = ElasticDocumentStore::new(ElasticDocumentStoreConfig {
            url: "not a url".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, NearbyError::Config(_)));
    }

    /// A cluster that only knows `_create`, answering 409 for ids it has seen.
    async fn spawn_create_only() -> String {
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let router = Router::new()
            .route(
                "/:collection/_create/:id",
                put(
                    |State(seen): State<Arc<Mutex<HashSet<String>>>>,
                     Path((collection, id)): Path<(String, String)>,
                     Json(_body): Json<Value>| async move {
                        if seen.lock().insert(format!("{collection}/{id}")) {
                            (axum::http::StatusCode::CREATED, Json(json!({"result": "created"})))
                        } else {
                            (
                                axum::http::StatusCode::CONFLICT,
                                Json(json!({"error": {"type": "version_conflict_engine_exception"}})),
                            )
                        }
                    },
                ),
            )
            .with_state(seen);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_create_conflict_is_false() {
        let store = ElasticDocumentStore::new(ElasticDocumentStoreConfig {
            url: spawn_create_only().await,
            ..Default::default()
        })
        .unwrap();

        assert!(store.create("user", "alice", json!({"n": 1})).await.unwrap());
        assert!(!store.create("user", "alice", json!({"n": 2})).await.unwrap());
        assert!(store.create("user", "bob", json!({"n": 3})).await.unwrap());

        let missing = ElasticDocumentStore::new(ElasticDocumentStoreConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            missing.create("user", "alice", json!({})).await,
            Err(NearbyError::DocumentStore(_))
        ));
    }
}
