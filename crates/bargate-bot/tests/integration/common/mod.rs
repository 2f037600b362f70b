//! Shared fixtures for pipeline integration tests.

pub mod fixtures;
