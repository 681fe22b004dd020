//! Single-document operations.
//!
//! This module provides the client application code uses to write, query,
//! update and delete individual documents. Every call is one round trip and
//! writes are refreshed immediately.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::opensearch::queries::ids_query;
use crate::types::{DocumentWriteResponse, Highlight, SearchResponse};

/// Client for single-document operations.
#[derive(Clone)]
pub struct DocumentClient {
    client: Arc<dyn SearchEngineClient>,
}

impl DocumentClient {
    /// Create a new DocumentClient over the given engine handle.
    pub fn new(client: Arc<dyn SearchEngineClient>) -> Self {
        Self { client }
    }

    /// Write a document at `id`, replacing any existing document there.
    /// Input: index name, document id, document body
    /// Output: Result<DocumentWriteResponse, SearchError>
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        index: &str,
        id: &str,
        document: &T,
    ) -> Result<DocumentWriteResponse, SearchError> {
        validate_target(index, id)?;
        let body = serde_json::to_value(document)?;
        self.client.index_document(index, id, &body).await
    }

    /// Search an index with a caller-defined query.
    /// Input: index name, query (full body or bare clause), optional highlight
    /// Output: Result<SearchResponse, SearchError> (hits with highlighted fragments)
    pub async fn fetch<Q: Serialize + ?Sized>(
        &self,
        index: &str,
        query: &Q,
        highlight: Option<&Highlight>,
    ) -> Result<SearchResponse, SearchError> {
        validate_index(index)?;
        let query = serde_json::to_value(query)?;
        self.client.search(index, &query, highlight).await
    }

    /// Fetch the document stored at `id`, if any.
    pub async fn fetch_by_id(&self, index: &str, id: &str) -> Result<Option<Value>, SearchError> {
        validate_target(index, id)?;
        let response = self.client.search(index, &ids_query(&[id]), None).await?;
        Ok(response.hits.into_iter().next().map(|hit| hit.source))
    }

    /// Merge fields into the existing document at `id`.
    /// Input: index name, document id, partial document (object)
    /// Output: Result<DocumentWriteResponse, SearchError>, NotFound if `id` is absent
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        index: &str,
        id: &str,
        partial: &T,
    ) -> Result<DocumentWriteResponse, SearchError> {
        validate_target(index, id)?;
        let partial = serde_json::to_value(partial)?;
        if !partial.is_object() {
            return Err(SearchError::invalid_request("partial document must be an object"));
        }
        self.client.update_document(index, id, &partial).await
    }

    /// Remove the document at `id`.
    /// Input: index name, document id
    /// Output: Result<DocumentWriteResponse, SearchError>, NotFound if `id` is absent
    pub async fn delete(&self, index: &str, id: &str) -> Result<DocumentWriteResponse, SearchError> {
        validate_target(index, id)?;
        self.client.delete_document(index, id).await
    }
}

fn validate_index(index: &str) -> Result<(), SearchError> {
    if index.trim().is_empty() {
        return Err(SearchError::invalid_request("index is required"));
    }
    Ok(())
}

fn validate_target(index: &str, id: &str) -> Result<(), SearchError> {
    validate_index(index)?;
    if id.is_empty() {
        return Err(SearchError::invalid_request("id is required"));
    }
    Ok(())
}
