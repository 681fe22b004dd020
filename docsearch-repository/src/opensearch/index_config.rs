//! Default index settings.
//!
//! Used when an index is created without a caller-supplied mapping payload.

use serde_json::{json, Value};

/// Default number of primary shards.
pub const DEFAULT_SHARDS: u32 = 1;

/// Default number of replicas.
pub const DEFAULT_REPLICAS: u32 = 1;

/// Settings used when creating an index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    /// Explicit mappings; dynamic mapping is used when absent.
    pub mappings: Option<Value>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            number_of_shards: DEFAULT_SHARDS,
            number_of_replicas: DEFAULT_REPLICAS,
            mappings: None,
        }
    }
}

impl IndexConfig {
    /// Create settings with explicit mappings.
    pub fn with_mappings(mappings: Value) -> Self {
        Self {
            mappings: Some(mappings),
            ..Self::default()
        }
    }

    /// Render the index creation payload.
    ///
    /// Without explicit mappings the index uses dynamic mapping, with string
    /// fields mapped as `text` plus a `raw` keyword sub-field.
    pub fn to_json(&self) -> Value {
        let mappings = self.mappings.clone().unwrap_or_else(|| {
            json!({
                "dynamic": true,
                "dynamic_templates": [
                    {
                        "strings": {
                            "match_mapping_type": "string",
                            "mapping": {
                                "type": "text",
                                "fields": {
                                    "raw": { "type": "keyword", "ignore_above": 256 }
                                }
                            }
                        }
                    }
                ]
            })
        });

        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas
            },
            "mappings": mappings
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_structure() {
        let settings = IndexConfig::default().to_json();

        assert_eq!(settings["settings"]["number_of_shards"], 1);
        assert_eq!(settings["settings"]["number_of_replicas"], 1);
        assert_eq!(settings["mappings"]["dynamic"], true);

        let template = &settings["mappings"]["dynamic_templates"][0]["strings"];
        assert_eq!(template["match_mapping_type"], "string");
        assert_eq!(template["mapping"]["fields"]["raw"]["type"], "keyword");
    }

    #[test]
    fn test_explicit_mappings_are_used() {
        let mappings = json!({ "properties": { "title": { "type": "keyword" } } });
        let settings = IndexConfig::with_mappings(mappings.clone()).to_json();

        assert_eq!(settings["mappings"], mappings);
    }
}
