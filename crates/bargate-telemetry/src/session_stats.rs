//! Per-session statistics summary.
//!
//! Tallies decision events per symbol and logs a summary at each trading
//! day rollover and at shutdown:
//! - sized / executed / observe-only counts
//! - rejections by the sizing, exit and broker gates
//! - clamp rate of accepted exit plans

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::events::{DecisionEvent, EventSink};

/// Session statistics for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolSessionStats {
    pub sized: u64,
    pub planned: u64,
    pub clamped: u64,
    pub executed: u64,
    pub observe_only: u64,
    pub risk_rejected: u64,
    pub exit_rejected: u64,
    pub broker_rejected: u64,
}

impl SymbolSessionStats {
    /// Fraction of accepted exit plans that were clamped.
    pub fn clamp_rate(&self) -> f64 {
        if self.planned > 0 {
            self.clamped as f64 / self.planned as f64
        } else {
            0.0
        }
    }
}

struct Inner {
    started_at: Option<DateTime<Utc>>,
    by_symbol: BTreeMap<String, SymbolSessionStats>,
}

/// Session statistics reporter.
pub struct SessionStatsReporter {
    inner: Mutex<Inner>,
}

impl Default for SessionStatsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatsReporter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                started_at: None,
                by_symbol: BTreeMap::new(),
            }),
        }
    }

    /// Current statistics, keyed by symbol.
    pub fn get_stats(&self) -> BTreeMap<String, SymbolSessionStats> {
        self.inner.lock().by_symbol.clone()
    }

    /// Log the summary for the session ending at `now`.
    pub fn output_summary(&self, now: DateTime<Utc>) {
        let inner = self.inner.lock();
        let started = inner.started_at.unwrap_or(now);
        let duration = now - started;

        info!("========== Session Statistics Summary ==========");
        info!(
            "Period: {} ({} hours {} minutes)",
            started.format("%Y-%m-%d %H:%M:%S UTC"),
            duration.num_hours(),
            duration.num_minutes() % 60
        );

        for (symbol, s) in &inner.by_symbol {
            info!("--- {} ---", symbol);
            info!(
                "  Sized: {}  Executed: {}  Observe-only: {}",
                s.sized, s.executed, s.observe_only
            );
            info!(
                "  Rejected: risk={} exit={} broker={}",
                s.risk_rejected, s.exit_rejected, s.broker_rejected
            );
            info!(
                "  Clamp rate: {:.2}% ({}/{})",
                s.clamp_rate() * 100.0,
                s.clamped,
                s.planned
            );
        }

        info!("================================================");
    }

    /// Log the summary and start a new session at `now`.
    pub fn rollover(&self, now: DateTime<Utc>) {
        self.output_summary(now);
        let mut inner = self.inner.lock();
        inner.by_symbol.clear();
        inner.started_at = Some(now);
    }

    /// Session start, taken from the first event when not set explicitly.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().started_at
    }
}

impl EventSink for SessionStatsReporter {
    fn emit(&self, event: &DecisionEvent) {
        let Some(symbol) = event.symbol() else {
            return;
        };

        let mut inner = self.inner.lock();
        if inner.started_at.is_none() {
            inner.started_at = Some(event.bar_time());
        }
        let stats = inner
            .by_symbol
            .entry(symbol.as_str().to_string())
            .or_default();

        match event {
            DecisionEvent::ExecutionSized { .. } => stats.sized += 1,
            DecisionEvent::ExitPlanned { clamped, .. } => {
                stats.planned += 1;
                if *clamped {
                    stats.clamped += 1;
                }
            }
            DecisionEvent::OrderSubmitted { .. } => stats.executed += 1,
            DecisionEvent::SymbolOnboardingState { execute: false, .. } => {
                stats.observe_only += 1
            }
            DecisionEvent::RiskTooSmall { .. } | DecisionEvent::RiskCapHit { .. } => {
                stats.risk_rejected += 1
            }
            DecisionEvent::NoValidExit { .. } => stats.exit_rejected += 1,
            DecisionEvent::OrderRejected { .. } => stats.broker_rejected += 1,
            _ => {}
        }
    }
}
