//! Exit planning for bargate.
//!
//! `ExitPlanner` walks a fixed cascade of stop/target methods:
//! order block, fair value gap, untested zone, ATR fallback, legacy.
//! The first candidate whose final (post-clamp) RR meets the floor wins.

pub mod config;
pub mod error;
pub mod planner;

pub use config::ExitConfig;
pub use error::{ExitError, ExitResult};
pub use planner::{ExitPlanner, PlanRejection};
