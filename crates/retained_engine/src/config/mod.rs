//! Engine configuration
//!
//! Serializable configuration for the runtime: frame pacing, culling,
//! pool capacities, and spatial-index behavior. Loadable from TOML with
//! sensible defaults for every field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config contained an invalid value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Spatial-index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialConfig {
    /// Seed for the insertion tie-break PRNG
    ///
    /// Insertion into the bounding-hull tree breaks ties between two
    /// qualifying children with a uniform random draw. The seed is fixed
    /// by default so tree shape is reproducible between runs.
    pub rng_seed: u64,

    /// Capacity of the destroyed-node free list
    pub node_pool_capacity: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0x5eed_b0f5,
            node_pool_capacity: 256,
        }
    }
}

/// Message pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Capacity of the recycled-message free list
    pub pool_capacity: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self { pool_capacity: 512 }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Enable view-frustum culling during render dispatch
    ///
    /// When disabled, every render atom is treated as visible and the
    /// per-canvas visibility cache is bypassed.
    #[serde(default = "default_true")]
    pub frustum_culling: bool,

    /// Target interval between frames in milliseconds (0 = uncapped)
    #[serde(default)]
    pub frame_interval_ms: u64,

    /// Spatial-index settings
    #[serde(default)]
    pub spatial: SpatialConfig,

    /// Message pipeline settings
    #[serde(default)]
    pub messages: MessageConfig,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frustum_culling: true,
            frame_interval_ms: 0,
            spatial: SpatialConfig::default(),
            messages: MessageConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.messages.pool_capacity == 0 {
            return Err(ConfigError::Invalid(
                "messages.pool_capacity must be at least 1".to_string(),
            ));
        }
        if self.spatial.node_pool_capacity == 0 {
            return Err(ConfigError::Invalid(
                "spatial.node_pool_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
