//! Engine configuration.

use serde::Deserialize;

use crate::model::IsolationLevel;

fn default_payload_cache_capacity() -> usize {
    1024
}

fn default_isolation_level() -> IsolationLevel {
    IsolationLevel::ReadCommitted
}

fn default_log_operations() -> bool {
    true
}

/// Configuration of one space instance, deserializable from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct SpaceConfig {
    /// Capacity for containers created without an explicit bound,
    /// `None` for unbounded.
    #[serde(default)]
    pub default_container_capacity: Option<usize>,

    /// Payload cache slots per container.
    #[serde(default = "default_payload_cache_capacity")]
    pub payload_cache_capacity: usize,

    /// Isolation level for operations that do not name one.
    #[serde(default = "default_isolation_level")]
    pub default_isolation_level: IsolationLevel,

    /// Whether entry and lifecycle operations are logged.
    #[serde(default = "default_log_operations")]
    pub log_operations: bool,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        SpaceConfig {
            default_container_capacity: None,
            payload_cache_capacity: default_payload_cache_capacity(),
            default_isolation_level: default_isolation_level(),
            log_operations: default_log_operations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SpaceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.payload_cache_capacity, 1024);
        assert_eq!(config.default_container_capacity, None);
        assert_eq!(config.default_isolation_level, IsolationLevel::ReadCommitted);
        assert!(config.log_operations);
    }

    #[test]
    fn explicit_fields_win() {
        let config: SpaceConfig = serde_json::from_str(
            r#"{ "default_container_capacity": 100, "default_isolation_level": "RepeatableRead" }"#,
        )
        .unwrap();
        assert_eq!(config.default_container_capacity, Some(100));
        assert_eq!(config.default_isolation_level, IsolationLevel::RepeatableRead);
    }
}
