//! Bulk ingestion entry point.
//!
//! Loads a collection of documents without caller ids into one index through
//! a short-lived [`BulkProcessor`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docsearch_repository::{BulkIndexRequest, SearchEngineClient};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::IngestError;
use crate::processor::{BulkProcessor, BulkProcessorConfig, BulkStatsSnapshot};
use crate::reporter::{BatchObserver, FailureReporter};

/// Outcome of a `bulk_ingest` call.
///
/// The call succeeding says nothing about individual items; rejected items
/// are counted in `stats.items_failed` and reported to the observer.
#[derive(Debug, Clone)]
pub struct BulkIngestSummary {
    /// Target index.
    pub index: String,
    /// Number of documents enqueued.
    pub documents: usize,
    /// Dispatch statistics for this call.
    pub stats: BulkStatsSnapshot,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Loads documents into the search engine in concurrent batches.
///
/// Each call to [`BulkIngestor::bulk_ingest`] starts its own processor and
/// worker pool and shuts them down before returning.
pub struct BulkIngestor {
    client: Arc<dyn SearchEngineClient>,
    config: BulkProcessorConfig,
    observer: Arc<dyn BatchObserver>,
}

impl BulkIngestor {
    /// Create a new ingestor with the default configuration and a `FailureReporter`.
    pub fn new(client: Arc<dyn SearchEngineClient>) -> Self {
        Self {
            client,
            config: BulkProcessorConfig::default(),
            observer: Arc::new(FailureReporter::new()),
        }
    }

    /// Create a new ingestor with custom configuration.
    pub fn with_config(client: Arc<dyn SearchEngineClient>, config: BulkProcessorConfig) -> Self {
        Self {
            client,
            config,
            observer: Arc::new(FailureReporter::new()),
        }
    }

    /// Replace the batch observer.
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The processor configuration used for each call.
    pub fn config(&self) -> &BulkProcessorConfig {
        &self.config
    }

    /// Index every document under a freshly generated id.
    ///
    /// Returns once all documents have been dispatched and every worker has
    /// finished. Items rejected by the engine do not fail the call.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkIngestSummary)` - All documents were dispatched
    /// * `Err(IngestError::IndexNotFound)` - The index does not exist; nothing was started
    /// * `Err(IngestError::BufferStartup)` - The processor could not start; nothing was sent
    #[instrument(skip(self, documents))]
    pub async fn bulk_ingest<I>(&self, index: &str, documents: I) -> Result<BulkIngestSummary, IngestError>
    where
        I: IntoIterator<Item = Value>,
    {
        let started_at = Utc::now();

        if !self.client.index_exists(index).await? {
            return Err(IngestError::index_not_found(index));
        }

        let mut documents = documents.into_iter().peekable();
        if documents.peek().is_none() {
            info!("No documents to ingest");
            return Ok(BulkIngestSummary {
                index: index.to_string(),
                documents: 0,
                stats: BulkStatsSnapshot::default(),
                started_at,
                finished_at: Utc::now(),
            });
        }

        let processor = BulkProcessor::start(
            self.client.clone(),
            self.config.clone(),
            self.observer.clone(),
        )?;

        let mut enqueued = 0;
        let mut enqueue_error = None;
        for document in documents {
            let request = BulkIndexRequest::new(index, Uuid::new_v4().to_string(), document);
            if let Err(e) = processor.add(request).await {
                enqueue_error = Some(e);
                break;
            }
            enqueued += 1;
        }

        let stats = processor.close().await?;
        if let Some(e) = enqueue_error {
            return Err(e);
        }

        if let Err(e) = self.client.refresh_index(index).await {
            warn!(error = %e, "Failed to refresh index after bulk ingestion");
        }

        info!(
            documents = enqueued,
            batches = stats.batches_flushed,
            failed = stats.items_failed,
            "Bulk ingestion completed"
        );

        Ok(BulkIngestSummary {
            index: index.to_string(),
            documents: enqueued,
            stats,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsearch_repository::{BulkResponse, ErrorDetail, InMemorySearchEngine};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records failed ids and forwards to a `FailureReporter`.
    #[derive(Default)]
    struct RecordingObserver {
        reporter: FailureReporter,
        calls: AtomicUsize,
        failed_ids: Mutex<Vec<String>>,
    }

    impl BatchObserver for RecordingObserver {
        fn on_batch_complete(
            &self,
            execution_id: u64,
            requests: &[BulkIndexRequest],
            response: Option<&BulkResponse>,
        ) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(response) = response {
                let mut failed = self.failed_ids.lock().unwrap();
                failed.extend(response.failed().iter().map(|item| item.id.clone()));
            }
            self.reporter.on_batch_complete(execution_id, requests, response);
        }
    }

    fn config(bulk_actions: usize) -> BulkProcessorConfig {
        BulkProcessorConfig {
            bulk_actions,
            flush_interval_ms: 60_000,
            workers: 20,
            stats_enabled: true,
        }
    }

    fn documents(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "title": format!("doc {}", i), "n": i })).collect()
    }

    #[tokio::test]
    async fn test_ingest_thousand_documents() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.create_index("articles", &json!({})).await.unwrap();
        let ingestor = BulkIngestor::with_config(engine.clone(), config(100));

        let summary = ingestor.bulk_ingest("articles", documents(1000)).await.unwrap();

        assert_eq!(summary.documents, 1000);
        assert_eq!(summary.stats.items_dispatched, 1000);
        assert_eq!(summary.stats.items_failed, 0);
        assert!(engine.bulk_batch_sizes().iter().all(|&size| size <= 100));

        let ids: HashSet<String> = engine.document_ids("articles").await.into_iter().collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| Uuid::parse_str(id).is_ok()));
        assert_eq!(engine.count("articles").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_rejected_items_do_not_fail_the_call() {
        let engine = Arc::new(InMemorySearchEngine::new().with_rejection(|request| {
            (request.document["n"].as_u64().unwrap_or_default() % 10 == 0)
                .then(|| ErrorDetail::new("mapper_parsing_exception", "malformed payload"))
        }));
        engine.create_index("articles", &json!({})).await.unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let ingestor =
            BulkIngestor::with_config(engine.clone(), config(64)).with_observer(observer.clone());

        let summary = ingestor.bulk_ingest("articles", documents(1000)).await.unwrap();

        assert_eq!(summary.stats.items_failed, 100);
        assert_eq!(summary.stats.items_succeeded, 900);
        assert_eq!(observer.reporter.failures_logged(), 100);

        let failed: HashSet<String> = observer.failed_ids.lock().unwrap().iter().cloned().collect();
        assert_eq!(failed.len(), 100);
        let stored: HashSet<String> = engine.document_ids("articles").await.into_iter().collect();
        assert!(failed.is_disjoint(&stored));
        assert_eq!(stored.len(), 900);
    }

    #[tokio::test]
    async fn test_oversized_document_is_an_item_failure() {
        let engine = Arc::new(InMemorySearchEngine::new().with_max_document_bytes(64));
        engine.create_index("articles", &json!({})).await.unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let ingestor =
            BulkIngestor::with_config(engine.clone(), config(10)).with_observer(observer.clone());

        let docs = vec![json!({ "n": 1 }), json!({ "body": "x".repeat(500) })];
        let summary = ingestor.bulk_ingest("articles", docs).await.unwrap();

        assert_eq!(summary.stats.items_failed, 1);
        assert_eq!(observer.failed_ids.lock().unwrap().len(), 1);
        assert_eq!(engine.count("articles").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_index() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let observer = Arc::new(RecordingObserver::default());
        let ingestor =
            BulkIngestor::with_config(engine.clone(), config(10)).with_observer(observer.clone());

        let err = ingestor.bulk_ingest("missing", documents(5)).await.unwrap_err();

        assert!(matches!(err, IngestError::IndexNotFound(_)));
        assert_eq!(engine.bulk_calls(), 0);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.create_index("articles", &json!({})).await.unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let ingestor =
            BulkIngestor::with_config(engine.clone(), config(10)).with_observer(observer.clone());

        let summary = ingestor.bulk_ingest("articles", Vec::new()).await.unwrap();

        assert_eq!(summary.documents, 0);
        assert_eq!(summary.stats, BulkStatsSnapshot::default());
        assert_eq!(engine.bulk_calls(), 0);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_startup_error_sends_nothing() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.create_index("articles", &json!({})).await.unwrap();
        let mut bad = config(10);
        bad.workers = 0;
        let ingestor = BulkIngestor::with_config(engine.clone(), bad);

        let err = ingestor.bulk_ingest("articles", documents(5)).await.unwrap_err();

        assert!(matches!(err, IngestError::BufferStartup(_)));
        assert_eq!(engine.bulk_calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_still_succeeds() {
        let engine = Arc::new(InMemorySearchEngine::new().with_failing_bulk_transport());
        engine.create_index("articles", &json!({})).await.unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let ingestor =
            BulkIngestor::with_config(engine.clone(), config(10)).with_observer(observer.clone());

        let summary = ingestor.bulk_ingest("articles", documents(25)).await.unwrap();

        assert_eq!(summary.stats.batches_without_result, 3);
        assert_eq!(observer.reporter.missing_results(), 3);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 3);
    }
}
