//! Trade direction and the price geometry that depends on it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Price;

/// Trade direction: buy (long) or sell (short).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell.
    pub fn sign(&self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }

    /// Stop-loss price `distance` away from `entry` on the losing side.
    pub fn stop_price(&self, entry: Price, distance: Decimal) -> Price {
        match self {
            Self::Buy => entry - distance,
            Self::Sell => entry + distance,
        }
    }

    /// Take-profit price `distance` away from `entry` on the winning side.
    pub fn target_price(&self, entry: Price, distance: Decimal) -> Price {
        match self {
            Self::Buy => entry + distance,
            Self::Sell => entry - distance,
        }
    }

    /// Distance from entry to a stop, or `None` if the stop sits on the wrong side.
    pub fn stop_distance(&self, entry: Price, stop: Price) -> Option<Decimal> {
        let d = match self {
            Self::Buy => entry.inner() - stop.inner(),
            Self::Sell => stop.inner() - entry.inner(),
        };
        (d > Decimal::ZERO).then_some(d)
    }

    /// Distance from entry to a target, or `None` if the target sits on the wrong side.
    pub fn target_distance(&self, entry: Price, target: Price) -> Option<Decimal> {
        let d = match self {
            Self::Buy => target.inner() - entry.inner(),
            Self::Sell => entry.inner() - target.inner(),
        };
        (d > Decimal::ZERO).then_some(d)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}
