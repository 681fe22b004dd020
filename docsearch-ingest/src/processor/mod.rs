//! Write-behind bulk processor.
//!
//! Requests are enqueued into a bounded channel. A batcher task groups them
//! into batches, flushing when `bulk_actions` requests are buffered or when
//! `flush_interval_ms` has elapsed since the oldest buffered request arrived.
//! A fixed pool of dispatch workers pulls batches from a shared channel, sends
//! them to the engine's bulk endpoint and hands the outcome to the observer.
//!
//! ```text
//! add() ──► [items: mpsc] ──► batcher ──► [batches: mpsc] ──► worker 1..N ──► engine
//!                                                                   │
//!                                                                   └──► observer
//! ```

mod stats;

use std::sync::Arc;
use std::time::Duration;

use docsearch_repository::{BulkIndexRequest, SearchEngineClient};
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::errors::IngestError;
use crate::reporter::BatchObserver;

pub use stats::{BulkStats, BulkStatsSnapshot};

/// Configuration for the bulk processor.
#[derive(Debug, Clone)]
pub struct BulkProcessorConfig {
    /// Number of requests that forces a flush.
    pub bulk_actions: usize,
    /// Maximum time a request waits in the buffer before a flush (in milliseconds).
    pub flush_interval_ms: u64,
    /// Number of concurrent dispatch workers.
    pub workers: usize,
    /// Whether to keep dispatch statistics.
    pub stats_enabled: bool,
}

impl Default for BulkProcessorConfig {
    fn default() -> Self {
        Self {
            bulk_actions: 500,
            flush_interval_ms: 1,
            workers: 20,
            stats_enabled: true,
        }
    }
}

impl BulkProcessorConfig {
    /// The flush interval as a duration.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Capacity of the request queue; `add` waits when it is full.
    fn queue_capacity(&self) -> usize {
        self.bulk_actions.saturating_mul(2)
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.bulk_actions == 0 {
            return Err(IngestError::buffer_startup("bulk_actions must be at least 1"));
        }
        if self.workers == 0 {
            return Err(IngestError::buffer_startup("workers must be at least 1"));
        }
        Ok(())
    }
}

/// A group of requests flushed together.
#[derive(Debug)]
struct Batch {
    execution_id: u64,
    requests: Vec<BulkIndexRequest>,
}

/// A running bulk processor.
///
/// Created with [`BulkProcessor::start`], fed with [`BulkProcessor::add`] and
/// shut down with [`BulkProcessor::close`], which waits until every enqueued
/// request has been dispatched and every worker has finished.
pub struct BulkProcessor {
    sender: mpsc::Sender<BulkIndexRequest>,
    batcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<BulkStats>,
}

impl BulkProcessor {
    /// Start the batcher and the dispatch worker pool.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkProcessor)` - A running processor
    /// * `Err(IngestError::BufferStartup)` - If the configuration is unusable or
    ///   there is no async runtime to run the workers on
    pub fn start(
        client: Arc<dyn SearchEngineClient>,
        config: BulkProcessorConfig,
        observer: Arc<dyn BatchObserver>,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| IngestError::buffer_startup(format!("no async runtime: {}", e)))?;

        let (item_tx, item_rx) = mpsc::channel(config.queue_capacity());
        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(config.workers);
        let batch_rx = Arc::new(Mutex::new(batch_rx));
        let stats = Arc::new(BulkStats::default());
        let worker_stats = config.stats_enabled.then(|| stats.clone());

        let workers = (0..config.workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    client.clone(),
                    batch_rx.clone(),
                    observer.clone(),
                    worker_stats.clone(),
                ))
            })
            .collect();

        let batcher = tokio::spawn(run_batcher(
            item_rx,
            batch_tx,
            config.bulk_actions,
            config.flush_interval(),
        ));

        info!(
            bulk_actions = config.bulk_actions,
            flush_interval_ms = config.flush_interval_ms,
            workers = config.workers,
            "Bulk processor started"
        );

        Ok(Self {
            sender: item_tx,
            batcher,
            workers,
            stats,
        })
    }

    /// Enqueue a request.
    ///
    /// Waits only if the request queue is full.
    pub async fn add(&self, request: BulkIndexRequest) -> Result<(), IngestError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| IngestError::channel("bulk processor is no longer accepting requests"))
    }

    /// Current statistics (all zero when stats are disabled).
    pub fn stats(&self) -> BulkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop accepting requests, flush what is buffered and wait for all workers.
    pub async fn close(self) -> Result<BulkStatsSnapshot, IngestError> {
        let Self {
            sender,
            batcher,
            workers,
            stats,
        } = self;

        drop(sender);
        let batcher_result = batcher.await;
        let worker_results = join_all(workers).await;

        batcher_result?;
        for result in worker_results {
            result?;
        }

        let snapshot = stats.snapshot();
        info!(
            batches = snapshot.batches_flushed,
            items = snapshot.items_dispatched,
            failed = snapshot.items_failed,
            without_result = snapshot.batches_without_result,
            "Bulk processor closed"
        );
        Ok(snapshot)
    }
}

/// Group incoming requests into batches by size or age.
async fn run_batcher(
    mut items: mpsc::Receiver<BulkIndexRequest>,
    batches: mpsc::Sender<Batch>,
    bulk_actions: usize,
    flush_interval: Duration,
) {
    let mut buffer: Vec<BulkIndexRequest> = Vec::with_capacity(bulk_actions);
    let mut oldest: Option<Instant> = None;
    let mut execution_id: u64 = 0;

    loop {
        let deadline = oldest
            .map(|arrived| arrived + flush_interval)
            .unwrap_or_else(Instant::now);

        tokio::select! {
            received = items.recv() => {
                let Some(request) = received else {
                    break;
                };
                if buffer.is_empty() {
                    oldest = Some(Instant::now());
                }
                buffer.push(request);
                if buffer.len() < bulk_actions {
                    continue;
                }
            }
            _ = time::sleep_until(deadline), if oldest.is_some() => {}
        }

        oldest = None;
        if !flush(&batches, &mut buffer, &mut execution_id).await {
            return;
        }
    }

    flush(&batches, &mut buffer, &mut execution_id).await;
    debug!(batches = execution_id, "Batcher stopped");
}

/// Hand the buffered requests to the workers. Returns `false` if no worker is left.
async fn flush(
    batches: &mpsc::Sender<Batch>,
    buffer: &mut Vec<BulkIndexRequest>,
    execution_id: &mut u64,
) -> bool {
    if buffer.is_empty() {
        return true;
    }

    *execution_id += 1;
    let requests = std::mem::take(buffer);
    let count = requests.len();

    let batch = Batch {
        execution_id: *execution_id,
        requests,
    };
    if batches.send(batch).await.is_err() {
        error!(
            execution_id = *execution_id,
            items = count,
            "No dispatch worker left, dropping batch"
        );
        return false;
    }
    true
}

/// Pull batches off the shared queue and send them until it closes.
async fn run_worker(
    worker_id: usize,
    client: Arc<dyn SearchEngineClient>,
    batches: Arc<Mutex<mpsc::Receiver<Batch>>>,
    observer: Arc<dyn BatchObserver>,
    stats: Option<Arc<BulkStats>>,
) {
    loop {
        let next = batches.lock().await.recv().await;
        let Some(batch) = next else {
            break;
        };

        let sent = batch.requests.len();
        match client.bulk(&batch.requests).await {
            Ok(response) => {
                if let Some(stats) = &stats {
                    stats.record_response(sent, &response);
                }
                debug!(
                    worker_id = worker_id,
                    execution_id = batch.execution_id,
                    items = sent,
                    errors = response.errors,
                    "Batch dispatched"
                );
                observer.on_batch_complete(batch.execution_id, &batch.requests, Some(&response));
            }
            Err(e) => {
                if let Some(stats) = &stats {
                    stats.record_missing(sent);
                }
                warn!(
                    worker_id = worker_id,
                    execution_id = batch.execution_id,
                    items = sent,
                    error = %e,
                    "Bulk dispatch failed"
                );
                observer.on_batch_complete(batch.execution_id, &batch.requests, None);
            }
        }
    }

    debug!(worker_id = worker_id, "Dispatch worker stopped");
}
