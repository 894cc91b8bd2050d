use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, MergeError};

/// What `Combine` does with an object key present on both sides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyConflictPolicy {
    PreferCurrent,
    PreferIncoming,
    #[default]
    MergeRecursive,
}

/// Options for the `Combine` (union) algebra.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineOptions {
    pub key_policy: KeyConflictPolicy,
    /// Maximum object nesting merged recursively; `-1` is unbounded. At the
    /// limit, keys on both sides take the incoming value.
    pub max_depth: i64,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            key_policy: KeyConflictPolicy::MergeRecursive,
            max_depth: -1,
        }
    }
}

impl CombineOptions {
    /// Returns `true` if objects at `depth` may still be merged key by key.
    pub fn can_recurse(&self, depth: usize) -> bool {
        self.max_depth < 0 || (depth as i64) < self.max_depth
    }
}

/// Configuration for the merge engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Whether the structural patch deletes content absent from the incoming
    /// document. When `false` the accumulated tree keeps it and the removal
    /// stays a conflict until resolved.
    pub apply_removals: bool,
    /// Whether array-level conflicts are expanded per index and linked.
    pub link_array_items: bool,
    pub combine: CombineOptions,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            apply_removals: false,
            link_array_items: true,
            combine: CombineOptions::default(),
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.combine.max_depth < -1 {
            return Err(MergeError::Config(format!(
                "combine.max_depth must be -1 or greater, got {}",
                self.combine.max_depth
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| MergeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| MergeError::Serialization(e.to_string()))
    }
}
