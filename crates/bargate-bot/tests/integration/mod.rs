//! Integration tests for bargate-bot.
//!
//! These tests verify the interaction between components:
//! - onboarding, sizing and exit planning on one bar
//! - drawdown halts across trading days
//! - replay determinism of events and persisted state

pub mod common;
