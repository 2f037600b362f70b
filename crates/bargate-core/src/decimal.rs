//! Precision-safe decimal types for sizing and exit levels.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Risk budgets are hard
//! limits, so every rounding helper here states its direction explicitly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// Price level (entry, stop, target) or a price distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Absolute distance to another price.
    #[inline]
    pub fn distance_to(&self, other: Price) -> Decimal {
        (self.0 - other.0).abs()
    }

    /// Round down to tick size.
    #[inline]
    pub fn floor_to_tick(&self, tick_size: Decimal) -> Self {
        if tick_size.is_zero() {
            return *self;
        }
        Self((self.0 / tick_size).floor() * tick_size)
    }

    /// Round up to tick size.
    #[inline]
    pub fn ceil_to_tick(&self, tick_size: Decimal) -> Self {
        if tick_size.is_zero() {
            return *self;
        }
        Self((self.0 / tick_size).ceil() * tick_size)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add<Decimal> for Price {
    type Output = Self;

    fn add(self, rhs: Decimal) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Decimal> for Price {
    type Output = Self;

    fn sub(self, rhs: Decimal) -> Self::Output {
        Self(self.0 - rhs)
    }
}

/// Tradable volume (lots / contracts / units) with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(pub Decimal);

impl Volume {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Round down to the broker volume step.
    ///
    /// Never rounds up: realized risk must stay within the budget.
    #[inline]
    pub fn floor_to_step(&self, step: Decimal) -> Self {
        if step.is_zero() {
            return *self;
        }
        Self((self.0 / step).floor() * step)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Volume {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Mul<Decimal> for Volume {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Self::Output {
        self.0 * rhs
    }
}
