//! Instrument identity, broker constraints, and decision identifiers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::{CoreError, Result};

/// Instrument symbol (e.g. `EURUSD`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Broker constraints for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    /// Account-currency value of a 1.0 price move for 1.0 volume.
    pub value_per_unit: Decimal,
    /// Volume increment accepted by the broker.
    pub volume_step: Decimal,
    /// Smallest tradable volume.
    pub min_volume: Decimal,
    /// Largest volume accepted in one order.
    #[serde(default)]
    pub max_volume: Option<Decimal>,
    /// Minimum distance between entry and stop/target.
    #[serde(default)]
    pub min_stop_distance: Decimal,
    /// Price tick; when set, exit levels are rounded to it.
    #[serde(default)]
    pub tick_size: Option<Decimal>,
}

impl SymbolSpec {
    /// Validate broker constraints.
    pub fn validate(&self, symbol: &str) -> Result<()> {
        if self.value_per_unit <= Decimal::ZERO {
            return Err(CoreError::InvalidSpec(format!(
                "{symbol}: value_per_unit must be positive"
            )));
        }
        if self.volume_step <= Decimal::ZERO {
            return Err(CoreError::InvalidSpec(format!(
                "{symbol}: volume_step must be positive"
            )));
        }
        if self.min_volume < Decimal::ZERO || self.min_stop_distance < Decimal::ZERO {
            return Err(CoreError::InvalidSpec(format!(
                "{symbol}: min_volume and min_stop_distance must be non-negative"
            )));
        }
        if let Some(max) = self.max_volume {
            if max < self.min_volume {
                return Err(CoreError::InvalidSpec(format!(
                    "{symbol}: max_volume below min_volume"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SymbolSpec {
    fn default() -> Self {
        // Standard FX lot: 100k units, 0.01 lot step
        Self {
            value_per_unit: Decimal::from(100_000),
            volume_step: Decimal::new(1, 2),
            min_volume: Decimal::new(1, 2),
            max_volume: None,
            min_stop_distance: Decimal::ZERO,
            tick_size: None,
        }
    }
}

/// Deterministic identifier of one sized decision: `{symbol}@{bar_time_ms}`.
///
/// Replaying the same bar yields the same id, which is what makes sizing
/// events and open-risk bookkeeping idempotent under retry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(String);

impl DecisionId {
    pub fn new(symbol: &Symbol, bar_time: DateTime<Utc>) -> Self {
        Self(format!("{}@{}", symbol, bar_time.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol part of the id.
    pub fn symbol(&self) -> Option<Symbol> {
        self.0.rsplit_once('@').map(|(s, _)| Symbol::from(s))
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
