//! Onboarding configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bargate_core::OnboardingStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{OnboardingError, OnboardingResult};

/// Static per-symbol overlay. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolOnboardingConfig {
    #[serde(default)]
    pub initial_state: Option<OnboardingStatus>,
    #[serde(default)]
    pub execute_when_promoted: Option<bool>,
    #[serde(default)]
    pub probation_min_sessions: Option<u64>,
    #[serde(default)]
    pub probation_min_trades: Option<u64>,
    #[serde(default)]
    pub max_validation_errors: Option<u64>,
    #[serde(default)]
    pub min_rr_during_probation: Option<Decimal>,
    #[serde(default)]
    pub risk_cap_multiplier_during_probation: Option<Decimal>,
}

/// Probation policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbationPolicyKind {
    /// Risk config passes through unchanged.
    #[default]
    PassthroughV1,
    /// Observe-only symbols get reduced risk and a raised RR floor.
    TightenV1,
}

/// Onboarding gate configuration (`[onboarding]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// Persisted state file (authoritative over `symbols`).
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default)]
    pub probation_policy: ProbationPolicyKind,
    /// Per-symbol overlays (`[onboarding.symbols.EURUSD]`).
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolOnboardingConfig>,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state/onboarding.json")
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            probation_policy: ProbationPolicyKind::default(),
            symbols: BTreeMap::new(),
        }
    }
}

impl OnboardingConfig {
    /// Validate overlay values.
    pub fn validate(&self) -> OnboardingResult<()> {
        for (symbol, cfg) in &self.symbols {
            check_probation_values(
                cfg.risk_cap_multiplier_during_probation,
                cfg.min_rr_during_probation,
            )
            .map_err(|e| OnboardingError::InvalidConfig(format!("{symbol}: {e}")))?;
        }
        Ok(())
    }
}

/// Range checks shared by config overlays and persisted records.
pub(crate) fn check_probation_values(
    risk_cap_multiplier: Option<Decimal>,
    min_rr: Option<Decimal>,
) -> Result<(), String> {
    if let Some(m) = risk_cap_multiplier {
        if m <= Decimal::ZERO || m > Decimal::ONE {
            return Err(format!(
                "risk_cap_multiplier_during_probation must be in (0, 1], got {m}"
            ));
        }
    }
    if let Some(rr) = min_rr {
        if rr <= Decimal::ZERO {
            return Err(format!("min_rr_during_probation must be positive, got {rr}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_partial_toml_overlay() {
        let cfg: OnboardingConfig = toml::from_str(
            r#"
            probation_policy = "tighten_v1"

            [symbols.EURUSD]
            initial_state = "observe_only"
            risk_cap_multiplier_during_probation = "0.5"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.probation_policy, ProbationPolicyKind::TightenV1);
        assert_eq!(cfg.state_path, PathBuf::from("state/onboarding.json"));
        let eurusd = &cfg.symbols["EURUSD"];
        assert_eq!(eurusd.initial_state, Some(OnboardingStatus::ObserveOnly));
        assert_eq!(eurusd.risk_cap_multiplier_during_probation, Some(dec!(0.5)));
        assert!(eurusd.execute_when_promoted.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_multiplier_out_of_range_rejected() {
        let mut cfg = OnboardingConfig::default();
        cfg.symbols.insert(
            "EURUSD".to_string(),
            SymbolOnboardingConfig {
                risk_cap_multiplier_during_probation: Some(dec!(1.5)),
                ..Default::default()
            },
        );
        assert!(cfg.validate().is_err());

        cfg.symbols.get_mut("EURUSD").unwrap().risk_cap_multiplier_during_probation =
            Some(dec!(0));
        assert!(cfg.validate().is_err());
    }
}
