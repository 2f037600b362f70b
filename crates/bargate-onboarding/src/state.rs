//! Onboarding state and the defaults ← config ← persisted merge.

use bargate_core::{OnboardingStatus, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{check_probation_values, SymbolOnboardingConfig};
use crate::error::{OnboardingError, OnboardingResult};

/// Resolved onboarding state of one symbol. Produced fresh on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolOnboardingState {
    pub symbol: Symbol,
    pub state: OnboardingStatus,
    pub execute_when_promoted: bool,
    pub sessions_seen: u64,
    pub trades_seen: u64,
    pub validation_errors: u64,
    pub last_promotion_timestamp: Option<DateTime<Utc>>,
    pub probation_min_sessions: u64,
    pub probation_min_trades: u64,
    pub max_validation_errors: u64,
    pub min_rr_during_probation: Option<Decimal>,
    pub risk_cap_multiplier_during_probation: Decimal,
}

impl SymbolOnboardingState {
    /// Built-in defaults: promoted, executing, zero counters, neutral thresholds.
    pub fn defaults(symbol: Symbol) -> Self {
        Self {
            symbol,
            state: OnboardingStatus::Promoted,
            execute_when_promoted: true,
            sessions_seen: 0,
            trades_seen: 0,
            validation_errors: 0,
            last_promotion_timestamp: None,
            probation_min_sessions: 0,
            probation_min_trades: 0,
            max_validation_errors: 0,
            min_rr_during_probation: None,
            risk_cap_multiplier_during_probation: Decimal::ONE,
        }
    }

    pub fn should_execute(&self) -> bool {
        self.state == OnboardingStatus::Promoted && self.execute_when_promoted
    }

    /// Full record for persistence.
    pub fn to_record(&self) -> SymbolOnboardingRecord {
        SymbolOnboardingRecord {
            state: Some(self.state),
            execute_when_promoted: Some(self.execute_when_promoted),
            sessions_seen: Some(self.sessions_seen),
            trades_seen: Some(self.trades_seen),
            validation_errors: Some(self.validation_errors),
            last_promotion_timestamp: self.last_promotion_timestamp,
            probation_min_sessions: Some(self.probation_min_sessions),
            probation_min_trades: Some(self.probation_min_trades),
            max_validation_errors: Some(self.max_validation_errors),
            min_rr_during_probation: self.min_rr_during_probation,
            risk_cap_multiplier_during_probation: Some(self.risk_cap_multiplier_during_probation),
        }
    }
}

/// Persisted per-symbol record.
///
/// Fields are optional so an operator can hand-write a partial record such as
/// `{"state": "promoted"}`; the gate always writes full records back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOnboardingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OnboardingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_when_promoted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_seen: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades_seen: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_promotion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probation_min_sessions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probation_min_trades: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_validation_errors: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rr_during_probation: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_cap_multiplier_during_probation: Option<Decimal>,
}

impl SymbolOnboardingRecord {
    /// Apply the same range checks as the config overlay.
    pub fn validate(&self, symbol: &Symbol) -> OnboardingResult<()> {
        check_probation_values(
            self.risk_cap_multiplier_during_probation,
            self.min_rr_during_probation,
        )
        .map_err(|e| OnboardingError::InvalidState(format!("{symbol}: {e}")))
    }
}

/// Resolve a symbol's state: defaults, then config, then persisted record.
///
/// Pure; the same inputs always give the same state.
pub fn merge_state(
    symbol: &Symbol,
    config: Option<&SymbolOnboardingConfig>,
    record: Option<&SymbolOnboardingRecord>,
) -> SymbolOnboardingState {
    let mut s = SymbolOnboardingState::defaults(symbol.clone());

    if let Some(c) = config {
        if let Some(v) = c.initial_state {
            s.state = v;
        }
        if let Some(v) = c.execute_when_promoted {
            s.execute_when_promoted = v;
        }
        if let Some(v) = c.probation_min_sessions {
            s.probation_min_sessions = v;
        }
        if let Some(v) = c.probation_min_trades {
            s.probation_min_trades = v;
        }
        if let Some(v) = c.max_validation_errors {
            s.max_validation_errors = v;
        }
        if c.min_rr_during_probation.is_some() {
            s.min_rr_during_probation = c.min_rr_during_probation;
        }
        if let Some(v) = c.risk_cap_multiplier_during_probation {
            s.risk_cap_multiplier_during_probation = v;
        }
    }

    if let Some(r) = record {
        if let Some(v) = r.state {
            s.state = v;
        }
        if let Some(v) = r.execute_when_promoted {
            s.execute_when_promoted = v;
        }
        if let Some(v) = r.sessions_seen {
            s.sessions_seen = v;
        }
        if let Some(v) = r.trades_seen {
            s.trades_seen = v;
        }
        if let Some(v) = r.validation_errors {
            s.validation_errors = v;
        }
        if r.last_promotion_timestamp.is_some() {
            s.last_promotion_timestamp = r.last_promotion_timestamp;
        }
        if let Some(v) = r.probation_min_sessions {
            s.probation_min_sessions = v;
        }
        if let Some(v) = r.probation_min_trades {
            s.probation_min_trades = v;
        }
        if let Some(v) = r.max_validation_errors {
            s.max_validation_errors = v;
        }
        if r.min_rr_during_probation.is_some() {
            s.min_rr_during_probation = r.min_rr_during_probation;
        }
        if let Some(v) = r.risk_cap_multiplier_during_probation {
            s.risk_cap_multiplier_during_probation = v;
        }
    }

    s
}
