//! Dependency initialization and wiring for the docsearch client.

use std::sync::Arc;
use tracing::info;

use docsearch_ingest::BulkIngestor;
use docsearch_repository::{
    DocumentClient, InMemorySearchEngine, IndexManager, OpenSearchClient, SearchEngineClient,
};

use crate::config::Settings;
use crate::AppError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Shared engine handle.
    pub engine: Arc<dyn SearchEngineClient>,
    pub indexes: IndexManager,
    pub documents: DocumentClient,
    pub ingestor: BulkIngestor,
}

impl Dependencies {
    /// Connect to the configured engine and wire every component to it.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - The engine answered a ping
    /// * `Err(AppError::SearchError)` - The engine is unreachable; callers treat this as fatal
    pub async fn connect(settings: &Settings) -> Result<Self, AppError> {
        info!(
            engine_url = %settings.engine.url,
            bulk_actions = settings.bulk.bulk_actions,
            workers = settings.bulk.workers,
            "Initializing dependencies"
        );

        let client = OpenSearchClient::connect(&settings.engine).await?;

        info!("Search engine connection verified");

        Ok(Self::wire(Arc::new(client), settings))
    }

    /// Wire every component to a fresh in-memory engine.
    pub fn in_memory(settings: &Settings) -> Self {
        info!("Using in-memory search engine");
        Self::wire(Arc::new(InMemorySearchEngine::new()), settings)
    }

    /// Wire every component to an existing engine handle.
    pub fn wire(engine: Arc<dyn SearchEngineClient>, settings: &Settings) -> Self {
        Self {
            indexes: IndexManager::new(engine.clone()),
            documents: DocumentClient::new(engine.clone()),
            ingestor: BulkIngestor::with_config(engine.clone(), settings.bulk.clone()),
            engine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_components_share_one_engine() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        let deps = Dependencies::in_memory(&settings);

        deps.indexes.create_index("notes", &json!({})).await.unwrap();
        deps.documents
            .upsert("notes", "1", &json!({ "text": "hello" }))
            .await
            .unwrap();
        let summary = deps
            .ingestor
            .bulk_ingest("notes", vec![json!({ "text": "bulk" })])
            .await
            .unwrap();

        assert_eq!(summary.documents, 1);
        assert_eq!(deps.indexes.count("notes").await.unwrap(), 2);
        assert_eq!(deps.ingestor.config().workers, 20);
    }
}
