//! Broker hand-off for bargate.
//!
//! The broker client itself lives outside this workspace. This crate
//! defines the seam it plugs into:
//! - `Executor`: dyn-compatible async submit
//! - `TimeoutExecutor`: bounded-time wrapper; a timeout is a rejection
//! - `DryRunExecutor`: accepts and logs, never touches a broker
//! - `MockExecutor`: records submissions for tests

pub mod config;
pub mod error;
pub mod executor;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{
    BoxFuture, DryRunExecutor, ExecutionOutcome, Executor, MockExecutor, OrderRequest,
    TimeoutExecutor,
};
