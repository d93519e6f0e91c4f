//! Runtime configuration loaded from a TOML file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GraphError, Result};

/// Environment variable that overrides the database path
pub const DATABASE_ENV: &str = "KBGRAPH_DB";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub graph: BuildConfig,
    pub query: QueryConfig,
    pub service: ServiceConfig,
}

/// Settings applied while assembling a graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Weight of RELATED_TO edges between related entities or concepts
    pub related_weight: f64,
    /// Floor for extracted scores, keeps every edge weight positive
    pub min_edge_weight: f64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            related_weight: 0.5,
            min_edge_weight: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub default_max_depth: usize,
    pub default_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_max_depth: 2,
            default_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub cache_enabled: bool,
    /// Deadline for fetching documents and running extraction; 0 disables it
    pub extraction_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("kbgraph.db"),
            cache_enabled: true,
            extraction_timeout_secs: 120,
        }
    }
}

impl ServiceConfig {
    pub fn extraction_timeout(&self) -> Option<Duration> {
        (self.extraction_timeout_secs > 0).then(|| Duration::from_secs(self.extraction_timeout_secs))
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)
            .map_err(|e| GraphError::InvalidInput(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| {
                GraphError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
            })?;
            Self::from_toml(&text)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        if let Ok(db_path) = std::env::var(DATABASE_ENV) {
            config.service.database_path = PathBuf::from(db_path);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.graph.related_weight) {
            return Err(GraphError::InvalidInput(
                "graph.related_weight must be a positive number".to_string(),
            ));
        }
        if !positive(self.graph.min_edge_weight) {
            return Err(GraphError::InvalidInput(
                "graph.min_edge_weight must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}
