//! # Docsearch Ingest
//!
//! This crate provides bulk ingestion of documents into the search engine.
//!
//! ## Architecture
//!
//! Ingestion follows a write-behind pattern:
//!
//! 1. **Loader**: `BulkIngestor::bulk_ingest` assigns ids and enqueues documents
//! 2. **Processor**: `BulkProcessor` batches requests by size or age and
//!    dispatches them from a fixed pool of concurrent workers
//! 3. **Reporter**: a `BatchObserver` (by default `FailureReporter`) receives
//!    every batch outcome and logs rejected items

pub mod errors;
pub mod loader;
pub mod processor;
pub mod reporter;

pub use errors::IngestError;
pub use loader::{BulkIngestSummary, BulkIngestor};
pub use processor::{BulkProcessor, BulkProcessorConfig, BulkStatsSnapshot};
pub use reporter::{BatchObserver, FailureReporter};
