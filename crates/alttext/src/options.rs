use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{dataflow::DataflowVersion, error::ConfigError};

/// Generation settings, fixed once a pipeline is built.
///
/// Deserializing from any partial object keeps the defaults for every key
/// the object leaves out. Keys this crate does not recognize are kept in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    /// Extract surrounding text before generating
    pub with_context: bool,
    /// Attach a content hash to each association
    pub with_hash: bool,
    /// Generate a batch concurrently instead of one image at a time
    pub multi_threaded: bool,
    /// Dataflow strategy (1 or 2)
    #[schemars(with = "u8")]
    pub version: DataflowVersion,
    /// Upper bound on images in flight in concurrent mode
    pub max_concurrency: usize,
    /// Timeout applied to every individual engine call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_timeout_secs: Option<u64>,
    /// Upper bound on nodes visited in each direction while extracting context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_hops: Option<usize>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            with_context: true,
            with_hash: true,
            multi_threaded: true,
            version: DataflowVersion::V2,
            max_concurrency: 8,
            engine_timeout_secs: None,
            max_context_hops: None,
            extra: Map::new(),
        }
    }
}

/// How a batch is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Concurrent { limit: usize },
}

impl GenerationOptions {
    /// Defaults with the given keys overridden
    pub fn from_overrides(overrides: &Map<String, Value>) -> Result<Self, ConfigError> {
        Self::default().merged_with(overrides)
    }

    /// Parse a JSON object of overrides
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content).map_err(|e| ConfigError::InvalidOption {
            key: "options".to_string(),
            message: e.to_string(),
        })?;
        match value {
            Value::Object(map) => Self::from_overrides(&map),
            other => Err(ConfigError::InvalidOption {
                key: "options".to_string(),
                message: format!("expected an object, got {}", other),
            }),
        }
    }

    /// A copy of these options with only the supplied keys replaced
    pub fn merged_with(&self, overrides: &Map<String, Value>) -> Result<Self, ConfigError> {
        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }

        let options: Self =
            serde_json::from_value(Value::Object(merged)).map_err(|e| ConfigError::InvalidOption {
                key: "options".to_string(),
                message: e.to_string(),
            })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidOption {
                key: "maxConcurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.engine_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidOption {
                key: "engineTimeoutSecs".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_secs.map(Duration::from_secs)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.multi_threaded {
            ExecutionMode::Concurrent {
                limit: self.max_concurrency.max(1),
            }
        } else {
            ExecutionMode::Sequential
        }
    }

    /// A pass-through key this crate does not interpret
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_defaults() {
        let options = GenerationOptions::default();
        assert!(options.with_context);
        assert!(options.with_hash);
        assert!(options.multi_threaded);
        assert_eq!(options.version, DataflowVersion::V2);
        assert_eq!(options.execution_mode(), ExecutionMode::Concurrent { limit: 8 });
    }

    #[test]
    fn test_version_override_leaves_other_keys_alone() {
        let options = GenerationOptions::from_overrides(&overrides(json!({ "version": 1 }))).unwrap();
        assert_eq!(options.version, DataflowVersion::V1);
        assert!(options.with_context);
        assert!(options.with_hash);
        assert!(options.multi_threaded);
    }

    #[test]
    fn test_merge_does_not_mutate_defaults() {
        let _ = GenerationOptions::from_overrides(&overrides(json!({ "withHash": false }))).unwrap();
        assert!(GenerationOptions::default().with_hash);
    }

    #[test]
    fn test_merge_over_existing_options() {
        let base = GenerationOptions::from_overrides(&overrides(json!({ "version": 1 }))).unwrap();
        let merged = base
            .merged_with(&overrides(json!({ "multiThreaded": false })))
            .unwrap();
        assert_eq!(merged.version, DataflowVersion::V1);
        assert_eq!(merged.execution_mode(), ExecutionMode::Sequential);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let options =
            GenerationOptions::from_json(r#"{ "withContext": false, "reviewer": "ana" }"#).unwrap();
        assert!(!options.with_context);
        assert_eq!(options.extra("reviewer"), Some(&json!("ana")));

        let round_trip = serde_json::to_value(&options).unwrap();
        assert_eq!(round_trip["reviewer"], "ana");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(GenerationOptions::from_json(r#"{ "version": 3 }"#).is_err());
        assert!(GenerationOptions::from_json(r#"{ "maxConcurrency": 0 }"#).is_err());
        assert!(GenerationOptions::from_json(r#"{ "engineTimeoutSecs": 0 }"#).is_err());
        assert!(GenerationOptions::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_timeout_conversion() {
        let options = GenerationOptions::from_json(r#"{ "engineTimeoutSecs": 30 }"#).unwrap();
        assert_eq!(options.engine_timeout(), Some(Duration::from_secs(30)));
    }
}
