//! Engine configuration.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for the file-operation engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Copy buffer size in bytes.
    #[builder(default = "64 * 1024")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Upper bound on conflict-rename attempts per destination name.
    #[builder(default = "4096")]
    #[serde(default = "default_max_conflict_attempts")]
    pub max_conflict_attempts: u32,

    /// How long terminal jobs stay listed before being pruned.
    #[builder(default = "Duration::from_secs(30)")]
    #[serde(default = "default_retention")]
    pub retention: Duration,

    /// Send deletions to the OS trash instead of removing permanently.
    #[builder(default = "false")]
    #[serde(default)]
    pub use_trash: bool,
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_max_conflict_attempts() -> u32 {
    4096
}

fn default_retention() -> Duration {
    Duration::from_secs(30)
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.chunk_size == Some(0) {
            return Err("chunk_size cannot be zero".to_string());
        }
        if self.max_conflict_attempts == Some(0) {
            return Err("max_conflict_attempts cannot be zero".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_conflict_attempts: default_max_conflict_attempts(),
            retention: default_retention(),
            use_trash: false,
        }
    }
}
