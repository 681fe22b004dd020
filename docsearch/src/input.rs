//! Document and mapping file parsing.

use std::path::Path;

use docsearch_repository::IndexConfig;
use serde_json::Value;

use crate::AppError;

/// Read documents from a file of newline-delimited JSON.
///
/// A file whose first non-blank character is `[` is read as a single JSON array.
pub async fn read_documents(path: &Path) -> Result<Vec<Value>, AppError> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_documents(&raw)
}

/// Parse NDJSON (or a JSON array) into documents. Blank lines are skipped.
pub fn parse_documents(raw: &str) -> Result<Vec<Value>, AppError> {
    if raw.trim_start().starts_with('[') {
        let array: Vec<Value> = serde_json::from_str(raw)
            .map_err(|e| AppError::input(format!("invalid JSON array: {}", e)))?;
        return array.into_iter().map(require_object).collect();
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<Value>(line)
                .map_err(|e| AppError::input(format!("line {}: {}", n + 1, e)))
                .and_then(require_object)
        })
        .collect()
}

fn require_object(value: Value) -> Result<Value, AppError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(AppError::input(format!("expected a JSON object, got {}", value)))
    }
}

/// Read an optional mapping file and build the index creation body.
pub async fn read_index_body(path: Option<&Path>) -> Result<Value, AppError> {
    let mapping = match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await?;
            let value = serde_json::from_str(&raw)
                .map_err(|e| AppError::input(format!("invalid mapping file: {}", e)))?;
            Some(value)
        }
        None => None,
    };
    Ok(index_body(mapping))
}

/// A body that already has `settings` or `mappings` is sent as is; anything
/// else is treated as the `mappings` section.
pub fn index_body(mapping: Option<Value>) -> Value {
    match mapping {
        Some(body) if body.get("settings").is_some() || body.get("mappings").is_some() => body,
        Some(mappings) => IndexConfig::with_mappings(mappings).to_json(),
        None => IndexConfig::default().to_json(),
    }
}
