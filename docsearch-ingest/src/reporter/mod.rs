//! Batch observers.
//!
//! A `BatchObserver` is called once after every bulk dispatch, from whichever
//! worker sent the batch. `FailureReporter` is the default observer: it logs
//! every item the engine rejected so the run can be reconciled offline.

use std::sync::atomic::{AtomicU64, Ordering};

use docsearch_repository::{BulkIndexRequest, BulkResponse, BulkResponseItem};
use serde_json::Value;
use tracing::{debug, warn};

/// Receives the outcome of every dispatched batch.
///
/// Implementations are shared by all dispatch workers and may be called
/// concurrently. The return value of the callback never influences the
/// processor.
pub trait BatchObserver: Send + Sync {
    /// Called after a batch dispatch completes.
    ///
    /// # Arguments
    ///
    /// * `execution_id` - Identifier of the batch within this processor run
    /// * `requests` - The requests that were sent
    /// * `response` - The engine's per-item result, or `None` if the batch produced no result
    fn on_batch_complete(
        &self,
        execution_id: u64,
        requests: &[BulkIndexRequest],
        response: Option<&BulkResponse>,
    );
}

impl<F> BatchObserver for F
where
    F: Fn(u64, &[BulkIndexRequest], Option<&BulkResponse>) + Send + Sync,
{
    fn on_batch_complete(
        &self,
        execution_id: u64,
        requests: &[BulkIndexRequest],
        response: Option<&BulkResponse>,
    ) {
        self(execution_id, requests, response)
    }
}

/// Logs rejected bulk items.
///
/// Keeps two lock-free counters so callers that need strict accounting can
/// read them after the run.
#[derive(Debug, Default)]
pub struct FailureReporter {
    failures_logged: AtomicU64,
    missing_results: AtomicU64,
}

impl FailureReporter {
    /// Create a new reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rejected items logged so far.
    pub fn failures_logged(&self) -> u64 {
        self.failures_logged.load(Ordering::Relaxed)
    }

    /// Number of batches that produced no result.
    pub fn missing_results(&self) -> u64 {
        self.missing_results.load(Ordering::Relaxed)
    }

    fn log_failure(execution_id: u64, item: &BulkResponseItem) {
        let error_detail = item
            .error
            .as_ref()
            .map(|e| format!("{}: {}", e.kind, e.reason.as_deref().unwrap_or_default()))
            .unwrap_or_default();
        let get_result = item.get.as_ref().map(Value::to_string).unwrap_or_default();

        warn!(
            execution_id = execution_id,
            index = %item.index,
            doc_type = item.doc_type.as_deref().unwrap_or_default(),
            id = %item.id,
            version = item.version.unwrap_or_default(),
            status = item.status,
            result = item.result.as_deref().unwrap_or_default(),
            forced_refresh = item.forced_refresh,
            error = %error_detail,
            get_result = %get_result,
            "Bulk item failed"
        );
    }
}

impl BatchObserver for FailureReporter {
    fn on_batch_complete(
        &self,
        execution_id: u64,
        requests: &[BulkIndexRequest],
        response: Option<&BulkResponse>,
    ) {
        let Some(response) = response else {
            self.missing_results.fetch_add(1, Ordering::Relaxed);
            warn!(
                execution_id = execution_id,
                requests = requests.len(),
                "Bulk batch produced no result"
            );
            return;
        };

        let failed = response.failed();
        for item in &failed {
            Self::log_failure(execution_id, item);
        }
        self.failures_logged
            .fetch_add(failed.len() as u64, Ordering::Relaxed);

        debug!(
            execution_id = execution_id,
            requests = requests.len(),
            failed = failed.len(),
            took_ms = response.took,
            "Bulk batch completed"
        );
    }
}
