//! Error types for the docsearch repository.

mod search_error;

pub use search_error::SearchError;
