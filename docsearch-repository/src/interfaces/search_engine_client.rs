//! Search engine client trait definition.
//!
//! This module defines the client contract consumed from the remote document
//! search engine, allowing for different backend implementations (OpenSearch,
//! in-memory, mocks).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchError;
use crate::types::{
    BulkIndexRequest, BulkResponse, DocumentWriteResponse, Highlight, IndexAcknowledgement,
    SearchResponse,
};

/// Abstract interface for search engine operations.
///
/// Each method is exactly one round trip to the engine. Nothing here retries;
/// retry policy belongs to the caller.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so a single handle can be shared
/// by every component and by concurrent bulk workers.
///
/// # Error Handling
///
/// All methods return `Result<T, SearchError>`. Missing indexes or documents
/// surface as `SearchError::NotFound`, existing ones as
/// `SearchError::AlreadyExists`, network and protocol failures as
/// `SearchError::TransportError`.
#[async_trait]
pub trait SearchEngineClient: Send + Sync {
    /// Check that the engine is reachable.
    async fn ping(&self) -> Result<(), SearchError>;

    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchError>;

    /// Create an index with the given settings/mappings payload.
    ///
    /// Fails with `AlreadyExists` if the engine already has the index.
    async fn create_index(&self, index: &str, mapping: &Value)
        -> Result<IndexAcknowledgement, SearchError>;

    /// Delete an index.
    ///
    /// Fails with `NotFound` if the engine has no such index.
    async fn delete_index(&self, index: &str) -> Result<IndexAcknowledgement, SearchError>;

    /// Index a document at `id`, replacing any existing document.
    ///
    /// The write is refreshed immediately so that it is visible to the next search.
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> Result<DocumentWriteResponse, SearchError>;

    /// Execute a search.
    ///
    /// # Arguments
    ///
    /// * `index` - The index to search
    /// * `query` - The full request body (`{"query": ..., "size": ...}`)
    /// * `highlight` - Optional highlight specification merged into the body
    async fn search(
        &self,
        index: &str,
        query: &Value,
        highlight: Option<&Highlight>,
    ) -> Result<SearchResponse, SearchError>;

    /// Merge `partial` into the existing document at `id`, refreshing immediately.
    ///
    /// Fails with `NotFound` if no document exists at `id`.
    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<DocumentWriteResponse, SearchError>;

    /// Delete the document at `id`, refreshing immediately.
    ///
    /// Fails with `NotFound` if no document exists at `id`.
    async fn delete_document(&self, index: &str, id: &str)
        -> Result<DocumentWriteResponse, SearchError>;

    /// Send a batch of index actions to the bulk endpoint.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkResponse)` - Per-item outcomes; rejected items do not fail the call
    /// * `Err(SearchError)` - If the batch as a whole could not be delivered
    async fn bulk(&self, requests: &[BulkIndexRequest]) -> Result<BulkResponse, SearchError>;

    /// Count the documents in an index.
    async fn count(&self, index: &str) -> Result<u64, SearchError>;

    /// Make all completed writes to an index visible to search.
    async fn refresh_index(&self, index: &str) -> Result<(), SearchError>;
}
