//! Search error types.
//!
//! This module defines the errors returned by engine round trips, index
//! lifecycle calls and single-document operations.

use thiserror::Error;

/// Errors that can occur while talking to the search engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The engine handle could not be established.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// The index or document already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The index or document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A round trip failed at the network or protocol layer.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Failed to serialize a payload for the engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to parse a response from the engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The request was rejected before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SearchError {
    /// Create a connection failure.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionFailure(msg.into())
    }

    /// Create an already-exists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Whether this error reports a missing index or document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error reports an existing index or document.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_error_is_serialization_error() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "non-string key");

        let err: SearchError = serde_json::to_value(&bad).unwrap_err().into();

        assert!(matches!(err, SearchError::SerializationError(msg) if msg.contains("key must be a string")));
    }
}
