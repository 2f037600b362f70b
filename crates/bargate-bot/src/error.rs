//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] bargate_onboarding::OnboardingError),

    #[error("Risk error: {0}")]
    Risk(#[from] bargate_risk::RiskError),

    #[error("Exit planner error: {0}")]
    Exit(#[from] bargate_exit::ExitError),

    #[error("Executor error: {0}")]
    Executor(#[from] bargate_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] bargate_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] bargate_persistence::PersistenceError),

    #[error("Bar input error at line {line}: {reason}")]
    BarInput { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
