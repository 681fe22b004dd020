//! OpenSearch client implementation.
//!
//! This module provides the engine handle: the concrete implementation of
//! `SearchEngineClient` using the OpenSearch Rust client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesRefreshParts},
    params::Refresh,
    BulkParts, CountParts, DeleteParts, IndexParts, OpenSearch, SearchParts, UpdateParts,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::EngineConfig;
use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::opensearch::queries::{build_bulk_body, build_search_body};
use crate::types::{
    BulkIndexRequest, BulkResponse, BulkResponseItem, DocumentWriteResponse, Highlight,
    IndexAcknowledgement, SearchHit, SearchResponse,
};

/// OpenSearch client implementation.
///
/// Talks to exactly one configured endpoint through a single-node connection
/// pool, so node sniffing never redirects traffic to other hosts.
///
/// # Example
///
/// ```ignore
/// use docsearch_repository::{EngineConfig, OpenSearchClient};
///
/// let config = EngineConfig::new("http://localhost:9200").with_credentials("admin", "admin");
/// let client = OpenSearchClient::connect(&config).await?;
/// client.index_document("articles", "1", &json!({ "title": "Hello" })).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    url: Url,
}

impl OpenSearchClient {
    /// Build a client for the configured endpoint without contacting it.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchError::ConnectionFailure)` - If the URL or transport is invalid
    pub fn new(config: &EngineConfig) -> Result<Self, SearchError> {
        let url = Url::parse(&config.url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(url.clone());
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(Duration::from_secs(config.request_timeout_secs));
        if let Some((username, password)) = config.credentials() {
            builder = builder.auth(Credentials::Basic(username.to_string(), password.to_string()));
        }
        let transport = builder
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        Ok(Self {
            client: OpenSearch::new(transport),
            url,
        })
    }

    /// Build a client and verify that the engine answers.
    ///
    /// This is the startup path for the process-wide handle. A failure here
    /// means the process cannot proceed.
    pub async fn connect(config: &EngineConfig) -> Result<Self, SearchError> {
        let client = Self::new(config)?;
        client.ping().await?;

        info!(
            url = %client.url,
            authenticated = config.credentials().is_some(),
            "Connected to search engine"
        );

        Ok(client)
    }

    /// The endpoint this client addresses.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Read a response body, mapping non-success statuses to typed errors.
    async fn read_json<T: DeserializeOwned>(
        response: Response,
        context: &str,
    ) -> Result<T, SearchError> {
        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &error_body, context));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SearchError::parse(format!("{}: {}", context, e)))
    }
}

/// Map a failed engine response to a `SearchError`.
fn classify_error(status: u16, body: &str, context: &str) -> SearchError {
    let error_type = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["type"].as_str().map(str::to_string))
        .unwrap_or_default();

    if error_type == "resource_already_exists_exception" {
        return SearchError::already_exists(context.to_string());
    }
    if status == 404 {
        return SearchError::not_found(context.to_string());
    }

    error!(status = status, body = %body, context = %context, "Engine request failed");
    SearchError::transport(format!("{} failed with status {}: {}", context, status, body))
}

/// Parse a single hit from a search response.
fn parse_hit(hit: &Value) -> Option<SearchHit> {
    let id = hit.get("_id")?.as_str()?.to_string();
    let index = hit
        .get("_index")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let score = hit.get("_score").and_then(Value::as_f64);
    let source = hit.get("_source").cloned().unwrap_or(Value::Null);
    let highlight = hit
        .get("highlight")
        .cloned()
        .and_then(|h| serde_json::from_value::<HashMap<String, Vec<String>>>(h).ok())
        .unwrap_or_default();

    Some(SearchHit {
        index,
        id,
        score,
        source,
        highlight,
    })
}

/// Parse a search response body.
fn parse_search_response(body: &Value) -> Result<SearchResponse, SearchError> {
    let hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| SearchError::parse("search response has no hits array"))?;

    // `hits.total` is an object on 7.x+ and a bare number on older engines.
    let total = body["hits"]["total"]["value"]
        .as_u64()
        .or_else(|| body["hits"]["total"].as_u64())
        .unwrap_or(hits.len() as u64);

    Ok(SearchResponse {
        took: body["took"].as_u64().unwrap_or(0),
        total,
        hits: hits.iter().filter_map(parse_hit).collect(),
    })
}

#[derive(Deserialize)]
struct RawBulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkResponseItem>>,
}

/// Parse a bulk response body, flattening `{"index": {...}}` item wrappers.
fn parse_bulk_response(body: Value) -> Result<BulkResponse, SearchError> {
    let raw: RawBulkResponse =
        serde_json::from_value(body).map_err(|e| SearchError::parse(e.to_string()))?;

    let items = raw
        .items
        .into_iter()
        .filter_map(|wrapper| {
            wrapper.into_iter().next().map(|(op_type, mut item)| {
                item.op_type = op_type;
                item
            })
        })
        .collect();

    Ok(BulkResponse {
        took: raw.took,
        errors: raw.errors,
        items,
    })
}

#[async_trait]
impl SearchEngineClient for OpenSearchClient {
    async fn ping(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchError::connection(format!("{}: {}", self.url, e)))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchError::connection(format!(
                "{} answered ping with status {}",
                self.url, status
            )));
        }
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SearchError::transport(format!(
                "index exists check for {} returned status {}",
                index, status
            ))),
        }
    }

    async fn create_index(
        &self,
        index: &str,
        mapping: &Value,
    ) -> Result<IndexAcknowledgement, SearchError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(mapping.clone())
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let ack: IndexAcknowledgement =
            Self::read_json(response, &format!("create index {}", index)).await?;
        info!(index = %index, acknowledged = ack.acknowledged, "Created index");
        Ok(ack)
    }

    async fn delete_index(&self, index: &str) -> Result<IndexAcknowledgement, SearchError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let ack: IndexAcknowledgement =
            Self::read_json(response, &format!("delete index {}", index)).await?;
        info!(index = %index, acknowledged = ack.acknowledged, "Deleted index");
        Ok(ack)
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> Result<DocumentWriteResponse, SearchError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(document.clone())
            .refresh(Refresh::True)
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let written: DocumentWriteResponse =
            Self::read_json(response, &format!("index document {}/{}", index, id)).await?;
        debug!(index = %index, id = %id, result = %written.result, "Document indexed");
        Ok(written)
    }

    async fn search(
        &self,
        index: &str,
        query: &Value,
        highlight: Option<&Highlight>,
    ) -> Result<SearchResponse, SearchError> {
        let body = build_search_body(query, highlight);

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let raw: Value = Self::read_json(response, &format!("search {}", index)).await?;
        parse_search_response(&raw)
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<DocumentWriteResponse, SearchError> {
        let response = self
            .client
            .update(UpdateParts::IndexId(index, id))
            .body(json!({ "doc": partial }))
            .refresh(Refresh::True)
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let written: DocumentWriteResponse =
            Self::read_json(response, &format!("update document {}/{}", index, id)).await?;
        debug!(index = %index, id = %id, result = %written.result, "Document updated");
        Ok(written)
    }

    async fn delete_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<DocumentWriteResponse, SearchError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .refresh(Refresh::True)
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let written: DocumentWriteResponse =
            Self::read_json(response, &format!("delete document {}/{}", index, id)).await?;
        debug!(index = %index, id = %id, "Document deleted");
        Ok(written)
    }

    async fn bulk(&self, requests: &[BulkIndexRequest]) -> Result<BulkResponse, SearchError> {
        if requests.is_empty() {
            return Ok(BulkResponse::default());
        }

        let body: Vec<JsonBody<Value>> = build_bulk_body(requests)
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let raw: Value = Self::read_json(response, "bulk").await?;
        let parsed = parse_bulk_response(raw)?;
        if parsed.items.len() != requests.len() {
            warn!(
                sent = requests.len(),
                received = parsed.items.len(),
                "Bulk response item count does not match request count"
            );
        }
        Ok(parsed)
    }

    async fn count(&self, index: &str) -> Result<u64, SearchError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let raw: Value = Self::read_json(response, &format!("count {}", index)).await?;
        raw["count"]
            .as_u64()
            .ok_or_else(|| SearchError::parse("count response has no count"))
    }

    async fn refresh_index(&self, index: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::transport(e.to_string()))?;

        let _: Value = Self::read_json(response, &format!("refresh {}", index)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = OpenSearchClient::new(&EngineConfig::new("not a url"));
        assert!(matches!(result, Err(SearchError::ConnectionFailure(_))));
    }

    #[test]
    fn test_new_keeps_configured_endpoint() {
        let config = EngineConfig::new("http://search.internal:9200").with_credentials("u", "p");
        let client = OpenSearchClient::new(&config).unwrap();
        assert_eq!(client.url().host_str(), Some("search.internal"));
    }

    #[test]
    fn test_classify_already_exists() {
        let body = r#"{"error":{"type":"resource_already_exists_exception","reason":"index [docs/abc] already exists"},"status":400}"#;
        let err = classify_error(400, body, "create index docs");
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_classify_not_found() {
        let body = r#"{"error":{"type":"index_not_found_exception"},"status":404}"#;
        assert!(classify_error(404, body, "delete index docs").is_not_found());

        let body = r#"{"_index":"docs","_id":"1","result":"not_found"}"#;
        assert!(classify_error(404, body, "delete document docs/1").is_not_found());
    }

    #[test]
    fn test_classify_other_status_is_transport() {
        let err = classify_error(503, "unavailable", "search docs");
        match err {
            SearchError::TransportError(msg) => {
                assert!(msg.contains("503"));
                assert!(msg.contains("search docs"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_hit() {
        let hit = json!({
            "_index": "docs",
            "_id": "1",
            "_score": 1.5,
            "_source": { "title": "Rust in production" },
            "highlight": { "title": ["<em>Rust</em> in production"] }
        });

        let result = parse_hit(&hit).unwrap();

        assert_eq!(result.id, "1");
        assert_eq!(result.index, "docs");
        assert_eq!(result.score, Some(1.5));
        assert_eq!(result.source["title"], "Rust in production");
        assert_eq!(result.highlight["title"][0], "<em>Rust</em> in production");
    }

    #[test]
    fn test_parse_hit_without_id() {
        let hit = json!({ "_source": { "title": "Missing id" } });
        assert!(parse_hit(&hit).is_none());
    }

    #[test]
    fn test_parse_search_response_total_formats() {
        let modern = json!({
            "took": 4,
            "hits": { "total": { "value": 7, "relation": "eq" }, "hits": [] }
        });
        let parsed = parse_search_response(&modern).unwrap();
        assert_eq!(parsed.total, 7);
        assert_eq!(parsed.took, 4);

        let legacy = json!({ "hits": { "total": 3, "hits": [] } });
        assert_eq!(parse_search_response(&legacy).unwrap().total, 3);

        assert!(parse_search_response(&json!({})).is_err());
    }

    #[test]
    fn test_parse_bulk_response() {
        let body = json!({
            "took": 30,
            "errors": true,
            "items": [
                {
                    "index": {
                        "_index": "docs",
                        "_id": "a",
                        "_version": 1,
                        "result": "created",
                        "status": 201,
                        "forced_refresh": false
                    }
                },
                {
                    "index": {
                        "_index": "docs",
                        "_id": "b",
                        "status": 400,
                        "error": {
                            "type": "mapper_parsing_exception",
                            "reason": "failed to parse field [n]",
                            "caused_by": { "type": "number_format_exception" }
                        }
                    }
                }
            ]
        });

        let parsed = parse_bulk_response(body).unwrap();

        assert_eq!(parsed.took, 30);
        assert!(parsed.errors);
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].op_type, "index");
        assert_eq!(parsed.items[0].version, Some(1));
        assert!(!parsed.items[0].is_failed());

        let failed = parsed.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "b");
        let detail = failed[0].error.as_ref().unwrap();
        assert_eq!(detail.kind, "mapper_parsing_exception");
        assert!(detail.caused_by.is_some());
        assert!(parsed.items[0].get.is_none());
    }

    #[test]
    fn test_parse_bulk_response_keeps_get_section() {
        let body = json!({
            "took": 2,
            "errors": false,
            "items": [
                {
                    "update": {
                        "_index": "docs",
                        "_id": "a",
                        "_version": 2,
                        "result": "updated",
                        "status": 200,
                        "get": { "found": true, "_source": { "title": "Merged" } }
                    }
                }
            ]
        });

        let parsed = parse_bulk_response(body).unwrap();

        let item = &parsed.items[0];
        assert_eq!(item.op_type, "update");
        let get = item.get.as_ref().unwrap();
        assert_eq!(get["_source"]["title"], "Merged");
    }
}
