//! OpenSearch request body builders.
//!
//! This module turns caller queries, highlight specifications and bulk
//! requests into the JSON payloads the engine expects.

use serde_json::{json, Map, Value};

use crate::types::{BulkIndexRequest, Highlight};

/// Build a search body from a caller query and optional highlight.
///
/// The caller query may be either a full request body (`{"query": {...}, "size": 10}`)
/// or a bare query clause (`{"match": {...}}`). Bare clauses are wrapped in
/// `{"query": ...}`. A highlight section, when given, replaces any highlight
/// already present in the body.
pub fn build_search_body(query: &Value, highlight: Option<&Highlight>) -> Value {
    let mut body = match query {
        Value::Object(map) if is_request_body(map) => map.clone(),
        Value::Object(map) if map.is_empty() => Map::new(),
        Value::Null => Map::new(),
        clause => {
            let mut map = Map::new();
            map.insert("query".to_string(), clause.clone());
            map
        }
    };

    if let Some(highlight) = highlight {
        body.insert("highlight".to_string(), highlight.to_json());
    }

    Value::Object(body)
}

/// Whether a JSON object is already a search request body rather than a query clause.
fn is_request_body(map: &Map<String, Value>) -> bool {
    const BODY_KEYS: [&str; 8] = [
        "query",
        "size",
        "from",
        "sort",
        "_source",
        "aggs",
        "highlight",
        "track_total_hits",
    ];
    map.keys().any(|key| BODY_KEYS.contains(&key.as_str()))
}

/// Build a query matching documents by id.
pub fn ids_query(ids: &[&str]) -> Value {
    json!({
        "query": {
            "ids": { "values": ids }
        }
    })
}

/// Build the newline-delimited bulk body for a batch of index requests.
///
/// Each request becomes two entries: the action line
/// (`{"index": {"_index": ..., "_id": ...}}`) followed by the document source.
pub fn build_bulk_body(requests: &[BulkIndexRequest]) -> Vec<Value> {
    let mut body = Vec::with_capacity(requests.len() * 2);
    for request in requests {
        body.push(json!({
            "index": {
                "_index": request.index,
                "_id": request.id
            }
        }));
        body.push(request.document.clone());
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_clause_is_wrapped() {
        let body = build_search_body(&json!({ "match": { "title": "rust" } }), None);

        assert_eq!(body["query"]["match"]["title"], "rust");
        assert!(body.get("highlight").is_none());
    }

    #[test]
    fn test_request_body_is_kept() {
        let query = json!({
            "query": { "term": { "tag": "db" } },
            "size": 5
        });
        let body = build_search_body(&query, None);

        assert_eq!(body, query);
    }

    #[test]
    fn test_highlight_is_attached() {
        let highlight = Highlight::new().field("title");
        let body = build_search_body(&json!({ "query": { "match_all": {} } }), Some(&highlight));

        assert!(body["query"]["match_all"].is_object());
        assert!(body["highlight"]["fields"]["title"].is_object());
    }

    #[test]
    fn test_empty_query_is_empty_body() {
        assert_eq!(build_search_body(&Value::Null, None), json!({}));
        assert_eq!(build_search_body(&json!({}), None), json!({}));
    }

    #[test]
    fn test_ids_query() {
        let query = ids_query(&["a", "b"]);
        let values = query["query"]["ids"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "a");
    }

    #[test]
    fn test_bulk_body_pairs_action_and_source() {
        let requests = vec![
            BulkIndexRequest::new("docs", "1", json!({ "n": 1 })),
            BulkIndexRequest::new("docs", "2", json!({ "n": 2 })),
        ];

        let body = build_bulk_body(&requests);

        assert_eq!(body.len(), 4);
        assert_eq!(body[0]["index"]["_index"], "docs");
        assert_eq!(body[0]["index"]["_id"], "1");
        assert_eq!(body[1], json!({ "n": 1 }));
        assert_eq!(body[2]["index"]["_id"], "2");
        assert_eq!(body[3], json!({ "n": 2 }));
    }
}
