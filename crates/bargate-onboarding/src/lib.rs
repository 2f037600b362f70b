//! Onboarding gate for bargate.
//!
//! Decides whether a symbol may send live orders. State for each symbol is
//! resolved on every read as defaults, overlaid by static configuration,
//! overlaid by persisted state (state wins).

pub mod config;
pub mod error;
pub mod gate;
pub mod policy;
pub mod state;

pub use config::{OnboardingConfig, ProbationPolicyKind, SymbolOnboardingConfig};
pub use error::{OnboardingError, OnboardingResult};
pub use gate::OnboardingGate;
pub use policy::{
    ManualPromotion, PassthroughV1, ProbationPolicy, PromotionPolicy, SymbolRiskConfig,
    TightenV1,
};
pub use state::{merge_state, SymbolOnboardingRecord, SymbolOnboardingState};
