//! bargate: per-bar trade decision gating.
//!
//! Orchestrates the gates every signal passes through:
//! - OnboardingGate: may this symbol trade live?
//! - RiskSizer: position size, open-risk cap and drawdown guard
//! - ExitPlanner: structure-first stop/target cascade
//! - Executor: bounded-time broker hand-off

pub mod app;
pub mod bar_source;
pub mod config;
pub mod error;
pub mod pipeline;

pub use app::{Application, RunSummary, StatusReport};
pub use bar_source::{BarInput, BarSource, JsonlBarSource, MemoryBarSource, SymbolBar};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use pipeline::{BarReport, DecisionPipeline, SymbolOutcome};
