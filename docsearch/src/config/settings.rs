//! Settings loaded from the environment.

use std::env;
use std::str::FromStr;

use docsearch_ingest::BulkProcessorConfig;
use docsearch_repository::config::{DEFAULT_ENGINE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use docsearch_repository::EngineConfig;

use crate::AppError;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: EngineConfig,
    pub bulk: BulkProcessorConfig,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: engine endpoint (default: http://localhost:9200)
    /// - `OPENSEARCH_USERNAME` / `OPENSEARCH_PASSWORD`: basic auth credentials
    /// - `OPENSEARCH_TIMEOUT_SECS`: request timeout (default: 30)
    /// - `BULK_ACTIONS`: documents per batch (default: 500)
    /// - `BULK_FLUSH_INTERVAL_MS`: maximum buffering delay (default: 1)
    /// - `BULK_WORKERS`: concurrent dispatch workers (default: 20)
    /// - `BULK_STATS`: keep dispatch statistics (default: true)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BulkProcessorConfig::default();

        let engine = EngineConfig {
            url: lookup("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string()),
            username: lookup("OPENSEARCH_USERNAME").filter(|v| !v.is_empty()),
            password: lookup("OPENSEARCH_PASSWORD").filter(|v| !v.is_empty()),
            request_timeout_secs: parse_var(
                &lookup,
                "OPENSEARCH_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        };

        let bulk = BulkProcessorConfig {
            bulk_actions: parse_var(&lookup, "BULK_ACTIONS", defaults.bulk_actions)?,
            flush_interval_ms: parse_var(&lookup, "BULK_FLUSH_INTERVAL_MS", defaults.flush_interval_ms)?,
            workers: parse_var(&lookup, "BULK_WORKERS", defaults.workers)?,
            stats_enabled: parse_var(&lookup, "BULK_STATS", defaults.stats_enabled)?,
        };

        if engine.username.is_some() != engine.password.is_some() {
            return Err(AppError::config(
                "OPENSEARCH_USERNAME and OPENSEARCH_PASSWORD must be set together",
            ));
        }

        Ok(Self { engine, bulk })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("{} has invalid value {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(|_| None).unwrap();

        assert_eq!(settings.engine.url, "http://localhost:9200");
        assert!(settings.engine.credentials().is_none());
        assert_eq!(settings.engine.request_timeout_secs, 30);
        assert_eq!(settings.bulk.bulk_actions, 500);
        assert_eq!(settings.bulk.flush_interval_ms, 1);
        assert_eq!(settings.bulk.workers, 20);
        assert!(settings.bulk.stats_enabled);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("OPENSEARCH_URL", "https://search.internal:9200"),
            ("OPENSEARCH_USERNAME", "ingest"),
            ("OPENSEARCH_PASSWORD", "secret"),
            ("BULK_ACTIONS", "1000"),
            ("BULK_FLUSH_INTERVAL_MS", " 250 "),
            ("BULK_WORKERS", "8"),
            ("BULK_STATS", "false"),
        ]))
        .unwrap();

        assert_eq!(settings.engine.url, "https://search.internal:9200");
        assert_eq!(settings.engine.credentials(), Some(("ingest", "secret")));
        assert_eq!(settings.bulk.bulk_actions, 1000);
        assert_eq!(settings.bulk.flush_interval_ms, 250);
        assert_eq!(settings.bulk.workers, 8);
        assert!(!settings.bulk.stats_enabled);
    }

    #[test]
    fn test_invalid_number() {
        let err = Settings::from_lookup(lookup_from(&[("BULK_WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(msg) if msg.contains("BULK_WORKERS")));
    }

    #[test]
    fn test_partial_credentials_rejected() {
        let err =
            Settings::from_lookup(lookup_from(&[("OPENSEARCH_USERNAME", "ingest")])).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
