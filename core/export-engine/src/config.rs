//! FILENAME: core/export-engine/src/config.rs
//! PURPOSE: Tunables for the export loop, loadable from JSON.

use std::io::Read;

use engine::{BackoffPolicy, PipeConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub pipe: PipeConfig,
    pub backoff: BackoffPolicy,
    /// Run a count query when the writer has a row maximum and the request's
    /// limit does not already guarantee it.
    pub count_rows_when_limited: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            pipe: PipeConfig::default(),
            backoff: BackoffPolicy::default(),
            count_rows_when_limited: true,
        }
    }
}

impl ExportConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ExportConfig::from_json(
            r#"{ "backoff": { "stall_threshold_ms": 5000 }, "pipe": { "capacity": 50 } }"#,
        )
        .unwrap();

        assert_eq!(config.backoff.stall_threshold_ms, 5000);
        assert_eq!(config.backoff.initial_interval_ms, 10);
        assert_eq!(config.pipe.capacity, 50);
        assert!(config.count_rows_when_limited);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ExportConfig::from_json("{}").unwrap(), ExportConfig::default());
    }
}
