//! Executor error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
