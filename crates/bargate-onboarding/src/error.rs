//! Onboarding error types.

use bargate_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Onboarding state persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid onboarding config: {0}")]
    InvalidConfig(String),

    #[error("Invalid persisted onboarding state: {0}")]
    InvalidState(String),
}

pub type OnboardingResult<T> = Result<T, OnboardingError>;
