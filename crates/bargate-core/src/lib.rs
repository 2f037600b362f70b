//! Core domain types for the bargate decision pipeline.
//!
//! This crate provides the types every gate speaks:
//! - `Price`, `Volume`: precision-safe numeric types
//! - `Symbol`, `SymbolSpec`, `DecisionId`: instrument identity and broker constraints
//! - `Signal`, `CandidateZone`, `ExitMethod`: pipeline inputs
//! - `SizedDecision`, `ExitPlan`, `RejectReason`: gate outputs

pub mod decimal;
pub mod decision;
pub mod direction;
pub mod error;
pub mod signal;
pub mod symbol;

pub use decimal::{Price, Volume};
pub use decision::{BrokerRejectCode, ExitPlan, OnboardingStatus, RejectReason, SizedDecision};
pub use direction::Direction;
pub use error::{CoreError, Result};
pub use signal::{CandidateZone, ExitMethod, Signal};
pub use symbol::{DecisionId, Symbol, SymbolSpec};
