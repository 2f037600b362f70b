//! Risk error types.

use bargate_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Risk state persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid account equity: {0}")]
    InvalidEquity(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
