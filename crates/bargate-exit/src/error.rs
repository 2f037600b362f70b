//! Error types for exit planning.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExitError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ExitResult<T> = Result<T, ExitError>;
