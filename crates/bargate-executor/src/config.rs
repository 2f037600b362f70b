//! Executor configuration (`[executor]`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, ExecutorResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on one broker hand-off. Default: 5000ms.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Accept and log orders without a broker. Default: true.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_dry_run() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            dry_run: default_dry_run(),
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> ExecutorResult<()> {
        if self.timeout_ms == 0 {
            return Err(ExecutorError::ConfigError(
                "timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
