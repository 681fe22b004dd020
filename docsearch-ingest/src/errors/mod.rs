//! Error types for bulk ingestion.

use docsearch_repository::SearchError;
use thiserror::Error;

/// Errors that fail a bulk ingestion call as a whole.
///
/// Rejected items inside a dispatched batch are not errors at this level;
/// they only reach the batch observer.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The target index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The write-behind buffer or its worker pool could not start.
    #[error("Buffer startup error: {0}")]
    BufferStartup(String),

    /// The buffer stopped accepting requests.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// A batcher or dispatch worker terminated abnormally.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// Error from the search engine.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),
}

impl IngestError {
    /// Create an index-not-found error.
    pub fn index_not_found(index: impl Into<String>) -> Self {
        Self::IndexNotFound(index.into())
    }

    /// Create a buffer startup error.
    pub fn buffer_startup(msg: impl Into<String>) -> Self {
        Self::BufferStartup(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Create a worker failure.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::WorkerFailed(msg.into())
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panicked_task_is_worker_failure() {
        let join_error = tokio::spawn(async { panic!("dispatch worker crashed") })
            .await
            .unwrap_err();

        let err = IngestError::from(join_error);

        assert!(matches!(err, IngestError::WorkerFailed(msg) if msg.contains("panic")));
    }
}
