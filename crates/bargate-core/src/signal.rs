//! Pipeline inputs: directional signals and candidate exit zones.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::{DecisionId, Direction, Price, Symbol};

/// Exit placement method, in cascade priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMethod {
    OrderBlock,
    FairValueGap,
    UntestedZone,
    AtrFallback,
    Legacy,
}

impl ExitMethod {
    /// Fixed cascade order. Earlier methods always win.
    pub const CASCADE: [ExitMethod; 5] = [
        ExitMethod::OrderBlock,
        ExitMethod::FairValueGap,
        ExitMethod::UntestedZone,
        ExitMethod::AtrFallback,
        ExitMethod::Legacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderBlock => "order_block",
            Self::FairValueGap => "fair_value_gap",
            Self::UntestedZone => "untested_zone",
            Self::AtrFallback => "atr_fallback",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ExitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate stop/target pair proposed by a structure detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateZone {
    pub method: ExitMethod,
    pub stop_loss: Price,
    pub take_profit: Price,
}

impl CandidateZone {
    pub fn new(method: ExitMethod, stop_loss: Price, take_profit: Price) -> Self {
        Self {
            method,
            stop_loss,
            take_profit,
        }
    }
}

/// Raw directional signal for one symbol on one bar close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub direction: Direction,
    pub bar_time: DateTime<Utc>,
    pub entry_price: Price,
    /// Strategy's own stop distance (pattern-specific).
    pub stop_distance: Decimal,
    /// Strategy's own target distance, if it proposes one.
    #[serde(default)]
    pub take_profit_distance: Option<Decimal>,
    /// ATR at signal time; enables the ATR fallback.
    #[serde(default)]
    pub atr: Option<Decimal>,
}

impl Signal {
    /// Deterministic id of the decision this signal produces.
    pub fn decision_id(&self) -> DecisionId {
        DecisionId::new(&self.symbol, self.bar_time)
    }

    /// Reject signals that cannot be sized.
    pub fn validate(&self) -> Result<()> {
        if !self.entry_price.is_positive() {
            return Err(CoreError::InvalidPrice(format!(
                "{}: entry price {} must be positive",
                self.symbol, self.entry_price
            )));
        }
        if self.stop_distance <= Decimal::ZERO {
            return Err(CoreError::InvalidSignal(format!(
                "{}: stop distance {} must be positive",
                self.symbol, self.stop_distance
            )));
        }
        if matches!(self.take_profit_distance, Some(d) if d <= Decimal::ZERO) {
            return Err(CoreError::InvalidSignal(format!(
                "{}: take profit distance must be positive",
                self.symbol
            )));
        }
        if matches!(self.atr, Some(a) if a < Decimal::ZERO) {
            return Err(CoreError::InvalidSignal(format!(
                "{}: negative ATR",
                self.symbol
            )));
        }
        Ok(())
    }
}
