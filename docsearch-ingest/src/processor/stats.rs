//! Bulk processor statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use docsearch_repository::BulkResponse;

/// Lock-free counters updated by dispatch workers.
#[derive(Debug, Default)]
pub struct BulkStats {
    flushed: AtomicU64,
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    without_result: AtomicU64,
}

/// Point-in-time copy of `BulkStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkStatsSnapshot {
    /// Batches handed to the engine.
    pub batches_flushed: u64,
    /// Items sent across all batches.
    pub items_dispatched: u64,
    /// Items the engine accepted.
    pub items_succeeded: u64,
    /// Items the engine rejected.
    pub items_failed: u64,
    /// Batches for which the engine returned no result.
    pub batches_without_result: u64,
}

impl BulkStats {
    /// Record a batch the engine answered.
    pub fn record_response(&self, sent: usize, response: &BulkResponse) {
        let failed = response.failed().len() as u64;
        let succeeded = response.items.len() as u64 - failed;

        self.flushed.fetch_add(1, Ordering::Relaxed);
        self.dispatched.fetch_add(sent as u64, Ordering::Relaxed);
        self.succeeded.fetch_add(succeeded, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Record a batch that produced no result.
    pub fn record_missing(&self, sent: usize) {
        self.flushed.fetch_add(1, Ordering::Relaxed);
        self.dispatched.fetch_add(sent as u64, Ordering::Relaxed);
        self.without_result.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> BulkStatsSnapshot {
        BulkStatsSnapshot {
            batches_flushed: self.flushed.load(Ordering::Relaxed),
            items_dispatched: self.dispatched.load(Ordering::Relaxed),
            items_succeeded: self.succeeded.load(Ordering::Relaxed),
            items_failed: self.failed.load(Ordering::Relaxed),
            batches_without_result: self.without_result.load(Ordering::Relaxed),
        }
    }
}
