//! # Docsearch
//!
//! Entry point library for the docsearch ingestion client.
//!
//! This crate provides configuration loading, dependency wiring and logging
//! setup for the `docsearch` binary.

pub mod config;
pub mod input;
pub mod logging;

pub use config::{Dependencies, Settings};

use docsearch_ingest::IngestError;
use docsearch_repository::SearchError;
use thiserror::Error;

/// Errors that can occur during startup or command execution.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),

    /// Malformed input documents or mapping.
    #[error("Input error: {0}")]
    InputError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputError(msg.into())
    }
}
