//! Decision events, Prometheus metrics and structured logging for bargate.
//!
//! Every gate reports through this crate:
//! - `DecisionEvent`: the structured event schema consumed by audits
//! - `EventSink`: fan-out seam (tracing + metrics, journal, in-memory)
//! - Prometheus metrics for sizing, exits, drawdown and execution
//! - Session statistics summary

pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod session_stats;

pub use error::{TelemetryError, TelemetryResult};
pub use events::{
    DecisionEvent, EventSink, FanoutSink, HaltKind, MemoryEventSink, TracingEventSink,
};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use session_stats::{SessionStatsReporter, SymbolSessionStats};
