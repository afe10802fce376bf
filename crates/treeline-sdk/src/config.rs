use std::path::Path;

use serde::{Deserialize, Serialize};
use treeline_propagate::{DEFAULT_MAX_DEPTH, DEFAULT_QUEUE_CAPACITY};

use crate::error::{SdkError, SdkResult};

/// Engine configuration, usually loaded from a `treeline.toml` file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Writer id stamped into record timestamps to break ties.
    pub node_id: u16,
    /// `tracing` filter directive used by front ends, e.g. `"treeline=debug"`.
    pub log_filter: String,
    pub propagation: PropagationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            log_filter: "info".into(),
            propagation: PropagationConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Levels of owners one pass may advance.
    pub max_depth: usize,
    /// Capacity of the async advancement queue.
    pub queue_capacity: usize,
    /// Save a new version of a tree node when one of its references is
    /// updated, and propagate that advancement in the same pass.
    pub cascade_versions: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cascade_versions: true,
        }
    }
}

impl EngineConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    fn validate(&self) -> SdkResult<()> {
        if self.propagation.queue_capacity == 0 {
            return Err(SdkError::Config("propagation.queue_capacity must be positive".into()));
        }
        Ok(())
    }
}
