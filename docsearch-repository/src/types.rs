//! Request and response types for search engine operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single index action destined for the engine's bulk endpoint.
///
/// Pairs a target index and document id with the document body. The bulk
/// processor builds one of these per enqueued document.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkIndexRequest {
    /// Target index name.
    pub index: String,
    /// Document identifier.
    pub id: String,
    /// Document body.
    pub document: Value,
}

impl BulkIndexRequest {
    /// Create a new bulk index request.
    pub fn new(index: impl Into<String>, id: impl Into<String>, document: Value) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            document,
        }
    }
}

/// Error detail attached to a rejected item or request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Engine error type (e.g. `mapper_parsing_exception`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Nested cause, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Value>,
}

impl ErrorDetail {
    /// Create an error detail with a type and reason.
    pub fn new(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            reason: Some(reason.into()),
            caused_by: None,
        }
    }
}

/// Per-item outcome inside a bulk response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResponseItem {
    /// Action that produced this item (`index`, `create`, ...).
    #[serde(skip)]
    pub op_type: String,
    #[serde(rename = "_index", default)]
    pub index: String,
    /// Mapping type; only reported by older engines.
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// HTTP-like status of this item.
    pub status: u16,
    /// `created`, `updated`, ... for successful items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default)]
    pub forced_refresh: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// Embedded `get` section, present when the action asked for the stored source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Value>,
}

impl BulkResponseItem {
    /// Create a successful `index` item.
    pub fn indexed(index: impl Into<String>, id: impl Into<String>, version: i64, created: bool) -> Self {
        Self {
            op_type: "index".to_string(),
            index: index.into(),
            doc_type: None,
            id: id.into(),
            version: Some(version),
            status: if created { 201 } else { 200 },
            result: Some(if created { "created" } else { "updated" }.to_string()),
            forced_refresh: false,
            error: None,
            get: None,
        }
    }

    /// Create a rejected `index` item.
    pub fn rejected(index: impl Into<String>, id: impl Into<String>, status: u16, error: ErrorDetail) -> Self {
        Self {
            op_type: "index".to_string(),
            index: index.into(),
            doc_type: None,
            id: id.into(),
            version: None,
            status,
            result: None,
            forced_refresh: false,
            error: Some(error),
            get: None,
        }
    }

    /// Whether the engine rejected this item.
    pub fn is_failed(&self) -> bool {
        !(200..=299).contains(&self.status) || self.error.is_some()
    }
}

/// Result of one bulk dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Milliseconds the engine spent on the batch.
    pub took: u64,
    /// Whether any item failed.
    pub errors: bool,
    /// Per-item outcomes, in request order.
    pub items: Vec<BulkResponseItem>,
}

impl BulkResponse {
    /// Build a response from items, deriving the `errors` flag.
    pub fn from_items(took: u64, items: Vec<BulkResponseItem>) -> Self {
        let errors = items.iter().any(BulkResponseItem::is_failed);
        Self { took, errors, items }
    }

    /// Items the engine rejected.
    pub fn failed(&self) -> Vec<&BulkResponseItem> {
        self.items.iter().filter(|item| item.is_failed()).collect()
    }

    /// Items the engine accepted.
    pub fn succeeded(&self) -> Vec<&BulkResponseItem> {
        self.items.iter().filter(|item| !item.is_failed()).collect()
    }
}

/// Response to a single-document write (index, update or delete).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentWriteResponse {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version", default)]
    pub version: i64,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub forced_refresh: bool,
}

/// Acknowledgement returned by index create/delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexAcknowledgement {
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards_acknowledged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub index: String,
    pub id: String,
    pub score: Option<f64>,
    /// The stored document.
    pub source: Value,
    /// Highlighted fragments keyed by field name.
    pub highlight: HashMap<String, Vec<String>>,
}

/// Result of a search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub took: u64,
    /// Total number of matching documents.
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Highlight specification attached to a search.
///
/// Serializes to the engine's `highlight` request section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlight {
    fields: Vec<String>,
    pre_tags: Vec<String>,
    post_tags: Vec<String>,
    fragment_size: Option<u32>,
    number_of_fragments: Option<u32>,
}

impl Highlight {
    /// Create an empty highlight specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlight matches in the given field.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Wrap highlighted terms in the given tags.
    pub fn tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.pre_tags = vec![pre.into()];
        self.post_tags = vec![post.into()];
        self
    }

    /// Set the fragment size in characters.
    pub fn fragment_size(mut self, size: u32) -> Self {
        self.fragment_size = Some(size);
        self
    }

    /// Set the maximum number of fragments per field.
    pub fn number_of_fragments(mut self, count: u32) -> Self {
        self.number_of_fragments = Some(count);
        self
    }

    /// Fields to highlight.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Pre/post tags, defaulting to `<em>`.
    pub fn tag_pair(&self) -> (&str, &str) {
        (
            self.pre_tags.first().map(String::as_str).unwrap_or("<em>"),
            self.post_tags.first().map(String::as_str).unwrap_or("</em>"),
        )
    }

    /// Render as the engine's highlight JSON section.
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        for field in &self.fields {
            fields.insert(field.clone(), Value::Object(Map::new()));
        }

        let mut highlight = Map::new();
        highlight.insert("fields".to_string(), Value::Object(fields));
        if !self.pre_tags.is_empty() {
            highlight.insert("pre_tags".to_string(), serde_json::json!(self.pre_tags));
            highlight.insert("post_tags".to_string(), serde_json::json!(self.post_tags));
        }
        if let Some(size) = self.fragment_size {
            highlight.insert("fragment_size".to_string(), serde_json::json!(size));
        }
        if let Some(count) = self.number_of_fragments {
            highlight.insert("number_of_fragments".to_string(), serde_json::json!(count));
        }
        Value::Object(highlight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_failure_detection() {
        let ok = BulkResponseItem::indexed("docs", "1", 1, true);
        assert!(!ok.is_failed());
        assert_eq!(ok.status, 201);

        let rejected = BulkResponseItem::rejected(
            "docs",
            "2",
            400,
            ErrorDetail::new("mapper_parsing_exception", "failed to parse"),
        );
        assert!(rejected.is_failed());

        let response = BulkResponse::from_items(3, vec![ok, rejected]);
        assert!(response.errors);
        assert_eq!(response.failed().len(), 1);
        assert_eq!(response.failed()[0].id, "2");
        assert_eq!(response.succeeded().len(), 1);
    }

    #[test]
    fn test_item_with_error_but_success_status_is_failed() {
        let mut item = BulkResponseItem::indexed("docs", "1", 1, true);
        item.error = Some(ErrorDetail::new("illegal_state", "odd"));
        assert!(item.is_failed());
    }

    #[test]
    fn test_highlight_json() {
        let highlight = Highlight::new()
            .field("title")
            .field("body")
            .tags("<b>", "</b>")
            .fragment_size(80);

        let value = highlight.to_json();
        assert_eq!(value["fields"]["title"], json!({}));
        assert_eq!(value["fields"]["body"], json!({}));
        assert_eq!(value["pre_tags"], json!(["<b>"]));
        assert_eq!(value["post_tags"], json!(["</b>"]));
        assert_eq!(value["fragment_size"], json!(80));
        assert!(value.get("number_of_fragments").is_none());
    }

    #[test]
    fn test_highlight_default_tags() {
        let highlight = Highlight::new().field("title");
        assert_eq!(highlight.tag_pair(), ("<em>", "</em>"));
        assert!(highlight.to_json().get("pre_tags").is_none());
    }

    #[test]
    fn test_write_response_deserialize() {
        let response: DocumentWriteResponse = serde_json::from_value(json!({
            "_index": "docs",
            "_id": "abc",
            "_version": 2,
            "result": "updated",
            "forced_refresh": true,
            "_shards": { "total": 2, "successful": 1, "failed": 0 }
        }))
        .unwrap();

        assert_eq!(response.index, "docs");
        assert_eq!(response.id, "abc");
        assert_eq!(response.version, 2);
        assert_eq!(response.result, "updated");
        assert!(response.forced_refresh);
    }
}
