//! # Docsearch Repository
//!
//! This crate provides the client contract for the remote document search
//! engine and everything built directly on it: errors, wire types, the
//! OpenSearch engine handle, an in-memory engine, index lifecycle management
//! and single-document operations.

pub mod client;
pub mod config;
pub mod errors;
pub mod index_manager;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use client::DocumentClient;
pub use config::EngineConfig;
pub use errors::SearchError;
pub use index_manager::IndexManager;
pub use interfaces::SearchEngineClient;
pub use memory::InMemorySearchEngine;
pub use opensearch::{IndexConfig, OpenSearchClient};
pub use types::{
    BulkIndexRequest, BulkResponse, BulkResponseItem, DocumentWriteResponse, ErrorDetail,
    Highlight, IndexAcknowledgement, SearchHit, SearchResponse,
};
