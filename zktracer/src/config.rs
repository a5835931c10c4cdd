use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Settings fixed for the lifetime of a tracer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TracerConfig {
    pub chain_id: u64,
    /// Maximum line count per module, keyed by module key. Modules without
    /// an entry are unbounded.
    pub module_limits: BTreeMap<String, usize>,
}

impl TracerConfig {
    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, module: impl Into<String>, limit: usize) -> Self {
        self.module_limits.insert(module.into(), limit);
        self
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read tracer configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed tracer configuration: {0}")]
    Json(#[from] serde_json::Error),
}
