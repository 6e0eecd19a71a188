//! Execution controller configuration.

use crate::error::{Result, StateError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution controller configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Ready requests collected before a batch is sent to the store.
    pub batch_size: usize,

    /// How long a ready request may wait in the buffer before the buffer is
    /// flushed regardless of its size.
    pub buffer_timeout_ms: u64,

    /// Bound on submitted-but-not-completed requests. Submissions beyond it
    /// block the submitting thread until requests complete.
    pub max_in_flight: usize,

    /// Number of executor threads talking to the store.
    pub worker_threads: usize,

    /// Name prefix of executor threads.
    pub thread_name_prefix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            buffer_timeout_ms: 1000,
            max_in_flight: 6000,
            worker_threads: 4,
            thread_name_prefix: "state-executor".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| StateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn buffer_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer_timeout_ms)
    }

    /// Check that the configuration can drive a controller.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(StateError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.max_in_flight == 0 {
            return Err(StateError::InvalidConfig(
                "max_in_flight must be positive".into(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(StateError::InvalidConfig(
                "worker_threads must be positive".into(),
            ));
        }
        Ok(())
    }
}
