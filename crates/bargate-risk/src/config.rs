//! Risk and drawdown configuration.
//!
//! Percentages are signed fractions (`-0.045` = 4.5% loss). Thresholds are
//! compared by magnitude.

use std::path::PathBuf;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

/// Per-trade sizing configuration (`[risk]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of equity risked per trade. Default: 0.005 (0.5%).
    #[serde(default = "default_per_trade_risk_pct")]
    pub per_trade_risk_pct: Decimal,
    /// Per-symbol cap on open risk, as a fraction of equity. Default: 0.01 (1%).
    #[serde(default = "default_per_symbol_open_risk_cap_pct")]
    pub per_symbol_open_risk_cap_pct: Decimal,
    /// Open-risk ledger file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

fn default_per_trade_risk_pct() -> Decimal {
    Decimal::new(5, 3)
}

fn default_per_symbol_open_risk_cap_pct() -> Decimal {
    Decimal::new(1, 2)
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("state/open_risk.json")
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            per_trade_risk_pct: default_per_trade_risk_pct(),
            per_symbol_open_risk_cap_pct: default_per_symbol_open_risk_cap_pct(),
            ledger_path: default_ledger_path(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if self.per_trade_risk_pct <= Decimal::ZERO || self.per_trade_risk_pct >= Decimal::ONE {
            return Err(RiskError::ConfigError(format!(
                "per_trade_risk_pct must be in (0, 1), got {}",
                self.per_trade_risk_pct
            )));
        }
        if self.per_symbol_open_risk_cap_pct <= Decimal::ZERO
            || self.per_symbol_open_risk_cap_pct >= Decimal::ONE
        {
            return Err(RiskError::ConfigError(format!(
                "per_symbol_open_risk_cap_pct must be in (0, 1), got {}",
                self.per_symbol_open_risk_cap_pct
            )));
        }
        Ok(())
    }
}

/// Drawdown guard configuration (`[drawdown]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownConfig {
    /// Account balance the total loss limit is measured from.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    /// Daily drawdown that raises a warning. Default: -0.03.
    #[serde(default = "default_daily_soft_stop_pct")]
    pub daily_soft_stop_pct: Decimal,
    /// Daily drawdown that halts new entries until the next trading day. Default: -0.045.
    #[serde(default = "default_daily_hard_stop_pct")]
    pub daily_hard_stop_pct: Decimal,
    /// Total loss from `initial_balance` that latches a halt. Default: -0.09.
    #[serde(default = "default_max_total_loss_pct")]
    pub max_total_loss_pct: Decimal,
    /// Risk multiplier applied to new entries after the soft stop.
    /// Default: 1 (warn only).
    #[serde(default = "default_soft_stop_risk_multiplier")]
    pub soft_stop_risk_multiplier: Decimal,
    /// UTC time of the daily window reset, `HH:MM`. Default: "00:00".
    #[serde(default = "default_daily_reset_utc")]
    pub daily_reset_utc: String,
    /// Drawdown window and halt latch file.
    #[serde(default = "default_drawdown_state_path")]
    pub state_path: PathBuf,
}

fn default_initial_balance() -> Decimal {
    Decimal::from(100_000)
}

fn default_daily_soft_stop_pct() -> Decimal {
    Decimal::new(-3, 2)
}

fn default_daily_hard_stop_pct() -> Decimal {
    Decimal::new(-45, 3)
}

fn default_max_total_loss_pct() -> Decimal {
    Decimal::new(-9, 2)
}

fn default_soft_stop_risk_multiplier() -> Decimal {
    Decimal::ONE
}

fn default_daily_reset_utc() -> String {
    "00:00".to_string()
}

fn default_drawdown_state_path() -> PathBuf {
    PathBuf::from("state/drawdown.json")
}

impl Default for DrawdownConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            daily_soft_stop_pct: default_daily_soft_stop_pct(),
            daily_hard_stop_pct: default_daily_hard_stop_pct(),
            max_total_loss_pct: default_max_total_loss_pct(),
            soft_stop_risk_multiplier: default_soft_stop_risk_multiplier(),
            daily_reset_utc: default_daily_reset_utc(),
            state_path: default_drawdown_state_path(),
        }
    }
}

impl DrawdownConfig {
    /// Parsed daily reset boundary.
    pub fn reset_time(&self) -> RiskResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_reset_utc, "%H:%M").map_err(|e| {
            RiskError::ConfigError(format!(
                "daily_reset_utc must be HH:MM, got {:?}: {e}",
                self.daily_reset_utc
            ))
        })
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.initial_balance <= Decimal::ZERO {
            return Err(RiskError::ConfigError(
                "initial_balance must be positive".to_string(),
            ));
        }
        for (name, pct) in [
            ("daily_soft_stop_pct", self.daily_soft_stop_pct),
            ("daily_hard_stop_pct", self.daily_hard_stop_pct),
            ("max_total_loss_pct", self.max_total_loss_pct),
        ] {
            if pct.is_zero() || pct.abs() >= Decimal::ONE {
                return Err(RiskError::ConfigError(format!(
                    "{name} must be a non-zero fraction in (-1, 1), got {pct}"
                )));
            }
        }
        if self.daily_hard_stop_pct.abs() < self.daily_soft_stop_pct.abs() {
            return Err(RiskError::ConfigError(format!(
                "|daily_hard_stop_pct| ({}) must be >= |daily_soft_stop_pct| ({})",
                self.daily_hard_stop_pct, self.daily_soft_stop_pct
            )));
        }
        if self.soft_stop_risk_multiplier <= Decimal::ZERO
            || self.soft_stop_risk_multiplier > Decimal::ONE
        {
            return Err(RiskError::ConfigError(format!(
                "soft_stop_risk_multiplier must be in (0, 1], got {}",
                self.soft_stop_risk_multiplier
            )));
        }
        self.reset_time()?;
        Ok(())
    }
}
