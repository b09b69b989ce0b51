//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::level::Level;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Simulated branch nodes for the in-process topology.
    #[serde(default)]
    pub branches: Vec<BranchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    pub id: String,

    /// Hierarchy level this node runs at
    #[serde(default = "default_level")]
    pub level: Level,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Data type to aggregate periodically
    #[serde(default = "default_data_type")]
    pub data_type: String,

    /// Aggregation interval in milliseconds
    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    /// Per-request deadline in milliseconds
    #[serde(default = "default_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            data_type: default_data_type(),
            interval_ms: default_interval(),
            request_timeout_ms: default_timeout(),
        }
    }
}

/// A simulated branch and the static metrics its provider serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    pub id: String,
    #[serde(default)]
    pub metrics: HashMap<String, serde_json::Value>,
}

// Defaults
fn default_level() -> Level { Level::Regional }
fn default_data_type() -> String { "ops-summary".to_string() }
fn default_interval() -> u64 { 10_000 }
fn default_timeout() -> u64 { 5_000 }

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                id: "regional-1".to_string(),
                level: default_level(),
            },
            aggregation: AggregationConfig::default(),
            branches: vec![
                BranchConfig {
                    id: "branch-1".to_string(),
                    metrics: HashMap::from([
                        ("deliveries".to_string(), serde_json::json!(42)),
                        ("couriers".to_string(), serde_json::json!(["ana", "bo"])),
                    ]),
                },
                BranchConfig {
                    id: "branch-2".to_string(),
                    metrics: HashMap::from([
                        ("deliveries".to_string(), serde_json::json!(17)),
                        ("couriers".to_string(), serde_json::json!(["cyn"])),
                    ]),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [node]
            id = "regional-west"
            "#,
        )
        .unwrap();
        assert_eq!(config.node.id, "regional-west");
        assert_eq!(config.node.level, Level::Regional);
        assert_eq!(config.aggregation.interval_ms, 10_000);
        assert!(config.branches.is_empty());
    }

    #[test]
    fn branch_metrics_parse_as_json_values() {
        let config: Config = toml::from_str(
            r#"
            [node]
            id = "regional-west"
            level = "local"

            [[branches]]
            id = "branch-9"
            [branches.metrics]
            deliveries = 3
            open = true
            "#,
        )
        .unwrap();
        // "local" is a synonym for branch
        assert_eq!(config.node.level, Level::Branch);
        let branch = &config.branches[0];
        assert_eq!(branch.metrics["deliveries"], serde_json::json!(3));
        assert_eq!(branch.metrics["open"], serde_json::json!(true));
    }
}
