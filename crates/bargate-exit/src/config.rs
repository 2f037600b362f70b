//! Exit planner configuration (`[exit]`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ExitError, ExitResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfig {
    /// RR floor when no probation override applies. Default: 2.0.
    #[serde(default = "default_rr_floor")]
    pub default_rr_floor: Decimal,
    /// ATR fallback stop = `atr_sl_multiplier × ATR`. Default: 1.5.
    #[serde(default = "default_atr_sl_multiplier")]
    pub atr_sl_multiplier: Decimal,
    /// ATR fallback target = `atr_tp_multiplier × ATR`, raised to meet the
    /// RR floor. Default: 3.0.
    #[serde(default = "default_atr_tp_multiplier")]
    pub atr_tp_multiplier: Decimal,
}

fn default_rr_floor() -> Decimal {
    Decimal::TWO
}

fn default_atr_sl_multiplier() -> Decimal {
    Decimal::new(15, 1)
}

fn default_atr_tp_multiplier() -> Decimal {
    Decimal::new(3, 0)
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            default_rr_floor: default_rr_floor(),
            atr_sl_multiplier: default_atr_sl_multiplier(),
            atr_tp_multiplier: default_atr_tp_multiplier(),
        }
    }
}

impl ExitConfig {
    pub fn validate(&self) -> ExitResult<()> {
        if self.default_rr_floor <= Decimal::ZERO {
            return Err(ExitError::ConfigError(format!(
                "default_rr_floor must be positive, got {}",
                self.default_rr_floor
            )));
        }
        if self.atr_sl_multiplier <= Decimal::ZERO || self.atr_tp_multiplier <= Decimal::ZERO {
            return Err(ExitError::ConfigError(
                "ATR multipliers must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
