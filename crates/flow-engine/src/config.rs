//! Engine configuration
//!
//! `ExecutorConfig` is deserializable from JSON with per-field defaults, so a
//! config file only needs the keys it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowEngineError, Result};

/// Single source of truth for engine defaults
pub mod defaults {
    /// Delay between node executions, for visualization
    pub const PACING_MS: u64 = 800;
    /// Maximum node executions per run (guards against cyclic flows)
    pub const MAX_STEPS: u32 = 1000;
    /// Maximum number of undo snapshots
    pub const HISTORY_LIMIT: usize = 100;
    /// Buffered log entries per broadcast subscriber
    pub const LOG_CHANNEL_CAPACITY: usize = 256;
}

/// Reserved identifiers used in log entries
pub mod system {
    /// Node id attached to entries not produced by a node
    pub const NODE_ID: &str = "system";
    /// Label attached to entries not produced by a node
    pub const LABEL: &str = "System";
}

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorConfig {
    /// Pause between node executions in milliseconds (0 = headless)
    pub pacing_ms: u64,
    /// Maximum number of node executions in one run
    pub max_steps: u32,
    /// Refuse to run flows with error-severity diagnostics
    pub require_valid: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pacing_ms: defaults::PACING_MS,
            max_steps: defaults::MAX_STEPS,
            require_valid: false,
        }
    }
}

impl ExecutorConfig {
    /// Configuration with pacing disabled
    pub fn headless() -> Self {
        Self {
            pacing_ms: 0,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded executor config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(FlowEngineError::Config(
                "maxSteps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}
