//! Gate outputs: sized decisions, exit plans and rejection codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DecisionId, Direction, ExitMethod, Price, Symbol, Volume};

// ============================================================================
// SizedDecision
// ============================================================================

/// Order sized by the risk gate. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedDecision {
    pub decision_id: DecisionId,
    pub symbol: Symbol,
    pub direction: Direction,
    pub bar_time: DateTime<Utc>,
    pub entry_price: Price,
    pub stop_distance: Decimal,
    pub volume: Volume,
    /// Risk budget for this trade (equity × pct × multipliers).
    pub risk_amount: Decimal,
    /// Risk actually taken after volume rounding: `volume × stop × value_per_unit`.
    pub realized_risk: Decimal,
    /// Per-symbol open-risk cap minus open risk including this trade.
    pub open_risk_budget_remaining: Decimal,
}

// ============================================================================
// ExitPlan
// ============================================================================

/// Final stop/target levels selected by the exit cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitPlan {
    pub method: ExitMethod,
    pub entry: Price,
    pub sl_requested: Price,
    pub sl_final: Price,
    pub tp_requested: Price,
    pub tp_final: Price,
    /// Broker minimum distance forced the levels wider.
    pub clamped: bool,
    /// `|tp_final - entry| / |entry - sl_final|`.
    pub rr: Decimal,
    pub rr_floor: Decimal,
}

impl ExitPlan {
    /// Distance from entry to the final stop.
    pub fn final_stop_distance(&self) -> Decimal {
        self.entry.distance_to(self.sl_final)
    }
}

// ============================================================================
// Reasons and status
// ============================================================================

/// Reason a decision did not reach (or was refused by) the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Rounded volume below the broker minimum.
    RiskTooSmall,
    /// Per-symbol open-risk cap would be exceeded.
    RiskCapHit,
    /// Daily hard stop tripped; no new entries until the next trading day.
    DailyDrawdownHalt,
    /// Total loss limit latched; manual reset required.
    TotalLossHalt,
    /// No exit method met the RR floor.
    NoValidExit,
    /// Broker refused the order or timed out.
    OrderRejected,
    /// Signal failed validation.
    InvalidSignal,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RiskTooSmall => "risk_too_small",
            Self::RiskCapHit => "risk_cap_hit",
            Self::DailyDrawdownHalt => "daily_drawdown_halt",
            Self::TotalLossHalt => "total_loss_halt",
            Self::NoValidExit => "no_valid_exit",
            Self::OrderRejected => "order_rejected",
            Self::InvalidSignal => "invalid_signal",
        }
    }

    /// Drawdown vetoes suppress all sizing, not just one symbol.
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::DailyDrawdownHalt | Self::TotalLossHalt)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker result codes the pipeline reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerRejectCode {
    InvalidStops,
    InsufficientMargin,
    MarketClosed,
    Timeout,
    Other,
}

impl BrokerRejectCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidStops => "invalid_stops",
            Self::InsufficientMargin => "insufficient_margin",
            Self::MarketClosed => "market_closed",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for BrokerRejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Onboarding state of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    /// Log-only; decisions are sized and planned but never sent.
    ObserveOnly,
    /// Live-eligible.
    Promoted,
}

impl OnboardingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObserveOnly => "observe_only",
            Self::Promoted => "promoted",
        }
    }
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reason_labels_match_serde() {
        for reason in [
            RejectReason::RiskTooSmall,
            RejectReason::RiskCapHit,
            RejectReason::DailyDrawdownHalt,
            RejectReason::TotalLossHalt,
            RejectReason::NoValidExit,
            RejectReason::OrderRejected,
            RejectReason::InvalidSignal,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
        assert!(RejectReason::DailyDrawdownHalt.is_halt());
        assert!(!RejectReason::RiskCapHit.is_halt());
    }

    #[test]
    fn test_onboarding_status_serde() {
        let s: OnboardingStatus = serde_json::from_str("\"observe_only\"").unwrap();
        assert_eq!(s, OnboardingStatus::ObserveOnly);
        assert_eq!(
            serde_json::to_string(&BrokerRejectCode::InvalidStops).unwrap(),
            "\"invalid_stops\""
        );
    }

    #[test]
    fn test_final_stop_distance() {
        let plan = ExitPlan {
            method: ExitMethod::AtrFallback,
            entry: Price::new(dec!(1.1000)),
            sl_requested: Price::new(dec!(1.0990)),
            sl_final: Price::new(dec!(1.0990)),
            tp_requested: Price::new(dec!(1.1022)),
            tp_final: Price::new(dec!(1.1022)),
            clamped: false,
            rr: dec!(2.2),
            rr_floor: dec!(2.0),
        };
        assert_eq!(plan.final_stop_distance(), dec!(0.0010));
    }
}
