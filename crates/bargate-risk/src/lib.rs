//! Risk gates for bargate.
//!
//! Every order passes through here before an exit is planned:
//! - RiskSizer: equity-percentage sizing with conservative volume rounding
//! - OpenRiskLedger: per-symbol open risk, idempotent by decision id
//! - DrawdownGuard: daily soft/hard stop and total loss limit
//!
//! Also provides:
//! - HaltLatch: total-loss latch, cleared only by an operator

pub mod config;
pub mod drawdown;
pub mod error;
pub mod halt;
pub mod ledger;
pub mod sizer;

pub use config::{DrawdownConfig, RiskConfig};
pub use drawdown::{trading_day, DailyEquityWindow, DrawdownGuard, DrawdownStatus};
pub use error::{RiskError, RiskResult};
pub use halt::{HaltLatch, HaltReason, HaltRecord};
pub use ledger::OpenRiskLedger;
pub use sizer::{RiskBudget, RiskSizer, SizingRejection};
