//! In-process search engine.
//!
//! `InMemorySearchEngine` implements `SearchEngineClient` without a network.
//! It honours the same lifecycle rules as a real engine (missing index,
//! missing document, duplicate index) and can be told to reject bulk items
//! or drop whole batches, which makes it the backend for dry runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::types::{
    BulkIndexRequest, BulkResponse, BulkResponseItem, DocumentWriteResponse, ErrorDetail,
    Highlight, IndexAcknowledgement, SearchHit, SearchResponse,
};

type Rejection = Box<dyn Fn(&BulkIndexRequest) -> Option<ErrorDetail> + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredDocument {
    source: Value,
    version: i64,
}

#[derive(Debug, Default)]
struct IndexState {
    mapping: Value,
    documents: BTreeMap<String, StoredDocument>,
}

/// An in-memory implementation of the search engine contract.
///
/// Searches support `match_all`, `ids`, `term` and `match` clauses on
/// top-level fields; anything else matches every document.
pub struct InMemorySearchEngine {
    indexes: RwLock<HashMap<String, IndexState>>,
    rejection: Option<Rejection>,
    max_document_bytes: Option<usize>,
    fail_bulk_transport: bool,
    bulk_calls: AtomicU64,
    bulk_batch_sizes: std::sync::Mutex<Vec<usize>>,
}

impl Default for InMemorySearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySearchEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            rejection: None,
            max_document_bytes: None,
            fail_bulk_transport: false,
            bulk_calls: AtomicU64::new(0),
            bulk_batch_sizes: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Reject bulk items for which `rule` returns an error detail.
    pub fn with_rejection<F>(mut self, rule: F) -> Self
    where
        F: Fn(&BulkIndexRequest) -> Option<ErrorDetail> + Send + Sync + 'static,
    {
        self.rejection = Some(Box::new(rule));
        self
    }

    /// Reject bulk items whose serialized body exceeds `bytes`.
    pub fn with_max_document_bytes(mut self, bytes: usize) -> Self {
        self.max_document_bytes = Some(bytes);
        self
    }

    /// Fail every bulk call at the transport level.
    pub fn with_failing_bulk_transport(mut self) -> Self {
        self.fail_bulk_transport = true;
        self
    }

    /// Number of bulk calls received.
    pub fn bulk_calls(&self) -> u64 {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    /// Sizes of every bulk batch received, in arrival order.
    pub fn bulk_batch_sizes(&self) -> Vec<usize> {
        self.bulk_batch_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    /// Ids stored in an index, sorted.
    pub async fn document_ids(&self, index: &str) -> Vec<String> {
        self.indexes
            .read()
            .await
            .get(index)
            .map(|state| state.documents.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The mapping an index was created with.
    pub async fn mapping(&self, index: &str) -> Option<Value> {
        self.indexes
            .read()
            .await
            .get(index)
            .map(|state| state.mapping.clone())
    }

    fn reject_reason(&self, request: &BulkIndexRequest) -> Option<(u16, ErrorDetail)> {
        if let Some(limit) = self.max_document_bytes {
            let size = serde_json::to_vec(&request.document)
                .map(|bytes| bytes.len())
                .unwrap_or(usize::MAX);
            if size > limit {
                return Some((
                    413,
                    ErrorDetail::new(
                        "illegal_argument_exception",
                        format!("document of {} bytes exceeds limit of {} bytes", size, limit),
                    ),
                ));
            }
        }
        self.rejection
            .as_ref()
            .and_then(|rule| rule(request))
            .map(|detail| (400, detail))
    }
}

fn index_missing(index: &str) -> SearchError {
    SearchError::not_found(format!("index {}", index))
}

fn write_response(index: &str, id: &str, version: i64, result: &str) -> DocumentWriteResponse {
    DocumentWriteResponse {
        index: index.to_string(),
        id: id.to_string(),
        version,
        result: result.to_string(),
        forced_refresh: true,
    }
}

/// Whether a stored document matches a query clause.
fn matches(clause: &Value, id: &str, source: &Value) -> bool {
    let Some(map) = clause.as_object() else {
        return true;
    };

    if let Some(ids) = map.get("ids") {
        return ids["values"]
            .as_array()
            .map(|values| values.iter().any(|v| v.as_str() == Some(id)))
            .unwrap_or(false);
    }
    if let Some(term) = map.get("term").and_then(Value::as_object) {
        return term.iter().all(|(field, expected)| {
            let expected = expected.get("value").unwrap_or(expected);
            if field == "_id" {
                expected.as_str() == Some(id)
            } else {
                &source[field] == expected
            }
        });
    }
    if let Some(query) = map.get("match").and_then(Value::as_object) {
        return query.iter().all(|(field, expected)| {
            let expected = expected.get("query").unwrap_or(expected);
            match (source[field].as_str(), expected.as_str()) {
                (Some(text), Some(needle)) => {
                    text.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => &source[field] == expected,
            }
        });
    }
    true
}

/// Wrap every case-insensitive occurrence of `needle` in `text` with tags.
///
/// Offsets always come from `text` itself; lowercasing can change a
/// character's byte length.
fn highlight_text(text: &str, needle: &str, pre: &str, post: &str) -> Option<String> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = String::with_capacity(text.len() + pre.len() + post.len());
    let mut cursor = 0;
    let mut found = false;
    let mut i = 0;
    while i < chars.len() {
        let Some(len) = lowercase_match_len(&chars[i..], &needle) else {
            i += 1;
            continue;
        };
        let start = chars[i].0;
        let end = chars.get(i + len).map(|(byte, _)| *byte).unwrap_or(text.len());
        out.push_str(&text[cursor..start]);
        out.push_str(pre);
        out.push_str(&text[start..end]);
        out.push_str(post);
        cursor = end;
        i += len;
        found = true;
    }

    if !found {
        return None;
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

/// Number of leading chars whose lowercase forms spell `needle` exactly.
fn lowercase_match_len(chars: &[(usize, char)], needle: &[char]) -> Option<usize> {
    let mut lowered = Vec::with_capacity(needle.len());
    for (n, (_, c)) in chars.iter().enumerate() {
        lowered.extend(c.to_lowercase());
        if lowered.len() >= needle.len() {
            return (lowered == needle).then_some(n + 1);
        }
    }
    None
}

fn highlights_for(
    clause: &Value,
    source: &Value,
    highlight: Option<&Highlight>,
) -> HashMap<String, Vec<String>> {
    let mut fragments = HashMap::new();
    let (Some(highlight), Some(query)) = (highlight, clause.get("match").and_then(Value::as_object))
    else {
        return fragments;
    };

    let (pre, post) = highlight.tag_pair();
    for field in highlight.fields() {
        let needle = query
            .get(field)
            .map(|v| v.get("query").unwrap_or(v))
            .and_then(Value::as_str);
        let text = source[field].as_str();
        if let (Some(needle), Some(text)) = (needle, text) {
            if let Some(fragment) = highlight_text(text, needle, pre, post) {
                fragments.insert(field.clone(), vec![fragment]);
            }
        }
    }
    fragments
}

#[async_trait]
impl SearchEngineClient for InMemorySearchEngine {
    async fn ping(&self) -> Result<(), SearchError> {
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchError> {
        Ok(self.indexes.read().await.contains_key(index))
    }

    async fn create_index(
        &self,
        index: &str,
        mapping: &Value,
    ) -> Result<IndexAcknowledgement, SearchError> {
        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(index) {
            return Err(SearchError::already_exists(format!("index {}", index)));
        }
        indexes.insert(
            index.to_string(),
            IndexState {
                mapping: mapping.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(IndexAcknowledgement {
            acknowledged: true,
            shards_acknowledged: Some(true),
            index: Some(index.to_string()),
        })
    }

    async fn delete_index(&self, index: &str) -> Result<IndexAcknowledgement, SearchError> {
        match self.indexes.write().await.remove(index) {
            Some(_) => Ok(IndexAcknowledgement {
                acknowledged: true,
                shards_acknowledged: None,
                index: None,
            }),
            None => Err(index_missing(index)),
        }
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> Result<DocumentWriteResponse, SearchError> {
        let mut indexes = self.indexes.write().await;
        let state = indexes.get_mut(index).ok_or_else(|| index_missing(index))?;

        let (version, result) = match state.documents.get(id) {
            Some(existing) => (existing.version + 1, "updated"),
            None => (1, "created"),
        };
        state.documents.insert(
            id.to_string(),
            StoredDocument {
                source: document.clone(),
                version,
            },
        );
        Ok(write_response(index, id, version, result))
    }

    async fn search(
        &self,
        index: &str,
        query: &Value,
        highlight: Option<&Highlight>,
    ) -> Result<SearchResponse, SearchError> {
        let body = crate::opensearch::queries::build_search_body(query, highlight);
        let clause = body.get("query").cloned().unwrap_or(Value::Object(Map::new()));
        let size = body["size"].as_u64().map(|s| s as usize).unwrap_or(10);

        let indexes = self.indexes.read().await;
        let state = indexes.get(index).ok_or_else(|| index_missing(index))?;

        let matched: Vec<SearchHit> = state
            .documents
            .iter()
            .filter(|(id, doc)| matches(&clause, id, &doc.source))
            .map(|(id, doc)| SearchHit {
                index: index.to_string(),
                id: id.clone(),
                score: Some(1.0),
                source: doc.source.clone(),
                highlight: highlights_for(&clause, &doc.source, highlight),
            })
            .collect();

        Ok(SearchResponse {
            took: 0,
            total: matched.len() as u64,
            hits: matched.into_iter().take(size).collect(),
        })
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<DocumentWriteResponse, SearchError> {
        let mut indexes = self.indexes.write().await;
        let state = indexes.get_mut(index).ok_or_else(|| index_missing(index))?;
        let existing = state
            .documents
            .get_mut(id)
            .ok_or_else(|| SearchError::not_found(format!("document {}/{}", index, id)))?;

        let fields = partial
            .as_object()
            .ok_or_else(|| SearchError::invalid_request("partial document must be an object"))?;
        if let Value::Object(source) = &mut existing.source {
            for (key, value) in fields {
                source.insert(key.clone(), value.clone());
            }
        } else {
            existing.source = partial.clone();
        }
        existing.version += 1;

        Ok(write_response(index, id, existing.version, "updated"))
    }

    async fn delete_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<DocumentWriteResponse, SearchError> {
        let mut indexes = self.indexes.write().await;
        let state = indexes.get_mut(index).ok_or_else(|| index_missing(index))?;
        let removed = state
            .documents
            .remove(id)
            .ok_or_else(|| SearchError::not_found(format!("document {}/{}", index, id)))?;

        Ok(write_response(index, id, removed.version + 1, "deleted"))
    }

    async fn bulk(&self, requests: &[BulkIndexRequest]) -> Result<BulkResponse, SearchError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.bulk_batch_sizes.lock() {
            sizes.push(requests.len());
        }

        if self.fail_bulk_transport {
            return Err(SearchError::transport("connection reset by peer"));
        }

        let mut indexes = self.indexes.write().await;
        let mut items = Vec::with_capacity(requests.len());
        for request in requests {
            if let Some((status, detail)) = self.reject_reason(request) {
                items.push(BulkResponseItem::rejected(&request.index, &request.id, status, detail));
                continue;
            }

            let Some(state) = indexes.get_mut(&request.index) else {
                items.push(BulkResponseItem::rejected(
                    &request.index,
                    &request.id,
                    404,
                    ErrorDetail::new("index_not_found_exception", "no such index"),
                ));
                continue;
            };

            let previous = state.documents.get(&request.id).map(|doc| doc.version);
            let version = previous.map(|v| v + 1).unwrap_or(1);
            state.documents.insert(
                request.id.clone(),
                StoredDocument {
                    source: request.document.clone(),
                    version,
                },
            );
            items.push(BulkResponseItem::indexed(
                &request.index,
                &request.id,
                version,
                previous.is_none(),
            ));
        }

        debug!(items = items.len(), "In-memory bulk applied");
        Ok(BulkResponse::from_items(0, items))
    }

    async fn count(&self, index: &str) -> Result<u64, SearchError> {
        let indexes = self.indexes.read().await;
        let state = indexes.get(index).ok_or_else(|| index_missing(index))?;
        Ok(state.documents.len() as u64)
    }

    async fn refresh_index(&self, index: &str) -> Result<(), SearchError> {
        if self.indexes.read().await.contains_key(index) {
            Ok(())
        } else {
            Err(index_missing(index))
        }
    }
}
