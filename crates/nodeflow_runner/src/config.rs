// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner configuration.

use indexmap::IndexMap;
use nodeflow_graph::{ComputeOrderStrategy, Value};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runner configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// The file is not valid RON
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Cause
        source: ron::error::SpannedError,
    },
}

/// What to run and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Graph asset, relative paths resolve against the config file
    pub graph: PathBuf,
    /// Strategy overriding the one stored in the asset
    pub compute_order: Option<ComputeOrderStrategy>,
    /// Number of runs
    pub iterations: u32,
    /// Default log filter, `RUST_LOG` takes precedence
    pub log_filter: String,
    /// Exposed parameter values applied before the first run
    pub parameters: IndexMap<String, Value>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            graph: PathBuf::from("graph.ron"),
            compute_order: None,
            iterations: 1,
            log_filter: "info".to_string(),
            parameters: IndexMap::new(),
        }
    }
}

impl RunnerConfig {
    /// Parse a configuration from RON text
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_ron(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.graph.is_relative() {
            if let Some(dir) = path.parent() {
                config.graph = dir.join(&config.graph);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = RunnerConfig::from_ron("(iterations: 3)").unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.graph, PathBuf::from("graph.ron"));
        assert_eq!(config.log_filter, "info");
        assert!(config.compute_order.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = RunnerConfig::from_ron(
            r#"RunnerConfig(
                graph: "demo.ron",
                compute_order: Some(BreadthFirst),
                parameters: {"speed": Float(2.0)},
            )"#,
        )
        .unwrap();
        assert_eq!(config.compute_order, Some(ComputeOrderStrategy::BreadthFirst));
        assert_eq!(config.parameters.get("speed"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn test_missing_file() {
        let result = RunnerConfig::load(Path::new("/nonexistent/runner.ron"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
