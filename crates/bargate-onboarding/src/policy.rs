//! Versioned probation and promotion policies.
//!
//! Both are pure functions of the merged state. Neither is consulted by
//! `record_outcome`; promotion runs as its own step so the policy can be
//! swapped without touching the counter path.

use bargate_core::OnboardingStatus;
use rust_decimal::Decimal;

use crate::config::ProbationPolicyKind;
use crate::state::SymbolOnboardingState;

/// Risk settings a probation policy may tighten for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRiskConfig {
    pub per_trade_risk_pct: Decimal,
    pub min_rr: Decimal,
}

/// Adjusts risk settings while a symbol is on probation.
pub trait ProbationPolicy: Send + Sync {
    fn version(&self) -> &'static str;

    /// Return the effective risk config. Must not depend on anything but its inputs.
    fn apply(&self, state: &SymbolOnboardingState, risk: &SymbolRiskConfig) -> SymbolRiskConfig;
}

/// Identity policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughV1;

impl ProbationPolicy for PassthroughV1 {
    fn version(&self) -> &'static str {
        "passthrough_v1"
    }

    fn apply(&self, _state: &SymbolOnboardingState, risk: &SymbolRiskConfig) -> SymbolRiskConfig {
        *risk
    }
}

/// Scales risk by `risk_cap_multiplier_during_probation` and raises the RR
/// floor to `min_rr_during_probation` while the symbol is observe-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TightenV1;

impl ProbationPolicy for TightenV1 {
    fn version(&self) -> &'static str {
        "tighten_v1"
    }

    fn apply(&self, state: &SymbolOnboardingState, risk: &SymbolRiskConfig) -> SymbolRiskConfig {
        if state.state != OnboardingStatus::ObserveOnly {
            return *risk;
        }
        let min_rr = match state.min_rr_during_probation {
            Some(rr) if rr > risk.min_rr => rr,
            _ => risk.min_rr,
        };
        SymbolRiskConfig {
            per_trade_risk_pct: risk.per_trade_risk_pct
                * state.risk_cap_multiplier_during_probation,
            min_rr,
        }
    }
}

impl ProbationPolicyKind {
    pub fn build(&self) -> Box<dyn ProbationPolicy> {
        match self {
            Self::PassthroughV1 => Box::new(PassthroughV1),
            Self::TightenV1 => Box::new(TightenV1),
        }
    }
}

/// Decides automatic state transitions.
pub trait PromotionPolicy: Send + Sync {
    fn version(&self) -> &'static str;

    /// New state for the symbol, or `None` to leave it unchanged.
    fn evaluate(&self, state: &SymbolOnboardingState) -> Option<OnboardingStatus>;
}

/// Promotion is an operator action only; thresholds are stored, not enforced.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualPromotion;

impl PromotionPolicy for ManualPromotion {
    fn version(&self) -> &'static str {
        "manual_v1"
    }

    fn evaluate(&self, _state: &SymbolOnboardingState) -> Option<OnboardingStatus> {
        None
    }
}
