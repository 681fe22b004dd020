//! Index lifecycle management.
//!
//! Creates and drops named indexes, guarding against duplicate creation and
//! deletion of missing indexes.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::types::IndexAcknowledgement;

/// Creates and deletes indexes on the search engine.
#[derive(Clone)]
pub struct IndexManager {
    client: Arc<dyn SearchEngineClient>,
}

impl IndexManager {
    /// Create a new manager over the given engine handle.
    pub fn new(client: Arc<dyn SearchEngineClient>) -> Self {
        Self { client }
    }

    /// Check whether an index exists.
    pub async fn index_exists(&self, name: &str) -> Result<bool, SearchError> {
        validate_name(name)?;
        self.client.index_exists(name).await
    }

    /// Create an index with the given mapping payload.
    ///
    /// The existence check and the creation are separate round trips. If
    /// another caller creates the index in between, the engine rejects the
    /// creation and this returns `AlreadyExists` as well.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexAcknowledgement)` - If the index was created
    /// * `Err(SearchError::AlreadyExists)` - If the index already exists
    /// * `Err(SearchError)` - If either round trip fails
    #[instrument(skip(self, mapping))]
    pub async fn create_index(
        &self,
        name: &str,
        mapping: &Value,
    ) -> Result<IndexAcknowledgement, SearchError> {
        validate_name(name)?;

        if self.client.index_exists(name).await? {
            return Err(SearchError::already_exists(format!("index {}", name)));
        }

        self.client.create_index(name, mapping).await
    }

    /// Delete an index.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexAcknowledgement)` - If the index was deleted
    /// * `Err(SearchError::NotFound)` - If the index does not exist
    #[instrument(skip(self))]
    pub async fn delete_index(&self, name: &str) -> Result<IndexAcknowledgement, SearchError> {
        validate_name(name)?;

        if !self.client.index_exists(name).await? {
            return Err(SearchError::not_found(format!("index {}", name)));
        }

        self.client.delete_index(name).await
    }

    /// Create an index unless it already exists.
    ///
    /// Returns `true` if this call created the index.
    pub async fn ensure_index(&self, name: &str, mapping: &Value) -> Result<bool, SearchError> {
        match self.create_index(name, mapping).await {
            Ok(_) => {
                info!(index = %name, "Index created");
                Ok(true)
            }
            Err(SearchError::AlreadyExists(_)) => {
                warn!(index = %name, "Index already exists, reusing it");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Number of documents in an index.
    pub async fn count(&self, name: &str) -> Result<u64, SearchError> {
        validate_name(name)?;
        self.client.count(name).await
    }
}

fn validate_name(name: &str) -> Result<(), SearchError> {
    if name.trim().is_empty() {
        return Err(SearchError::invalid_request("index name is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySearchEngine;
    use serde_json::json;

    fn manager() -> IndexManager {
        IndexManager::new(Arc::new(InMemorySearchEngine::new()))
    }

    #[tokio::test]
    async fn test_create_then_create_again() {
        let manager = manager();

        let ack = manager.create_index("articles", &json!({})).await.unwrap();
        assert!(ack.acknowledged);

        let err = manager.create_index("articles", &json!({})).await.unwrap_err();
        assert!(matches!(err, SearchError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_index() {
        let manager = manager();

        let err = manager.delete_index("articles").await.unwrap_err();
        assert!(matches!(err, SearchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_after_create() {
        let manager = manager();
        manager.create_index("articles", &json!({})).await.unwrap();

        manager.delete_index("articles").await.unwrap();
        assert!(!manager.index_exists("articles").await.unwrap());

        let err = manager.delete_index("articles").await.unwrap_err();
        assert!(matches!(err, SearchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mapping_is_passed_through() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let manager = IndexManager::new(engine.clone());
        let mapping = json!({ "mappings": { "properties": { "title": { "type": "text" } } } });

        manager.create_index("articles", &mapping).await.unwrap();

        assert_eq!(engine.mapping("articles").await, Some(mapping));
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let manager = manager();

        assert!(manager.ensure_index("articles", &json!({})).await.unwrap());
        assert!(!manager.ensure_index("articles", &json!({})).await.unwrap());
        assert_eq!(manager.count("articles").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let manager = manager();
        let err = manager.create_index("  ", &json!({})).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
    }
}
