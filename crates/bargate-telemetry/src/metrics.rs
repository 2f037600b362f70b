//! Prometheus metrics for the decision pipeline.
//!
//! Covers:
//! - Decision events by name and symbol
//! - Exit plan RR distribution and clamp counts
//! - Daily drawdown and per-symbol open risk
//! - Executor latency and bar throughput
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that should crash
//! at startup. These panics only occur during static initialization.

use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    register_histogram_vec, register_int_counter, CounterVec, Encoder, Gauge, GaugeVec,
    Histogram, HistogramVec, IntCounter, TextEncoder,
};

use crate::error::TelemetryResult;

/// Decision events emitted.
/// Labels: event (risk_too_small/risk_cap_hit/execution_sized/...), symbol
pub static DECISION_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bargate_decision_events_total",
        "Total decision events emitted",
        &["event", "symbol"]
    )
    .unwrap()
});

/// Exit plans whose levels were widened to the broker minimum.
pub static EXIT_CLAMPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bargate_exit_clamped_total",
        "Total exit plans clamped to broker minimum distance",
        &["symbol", "method"]
    )
    .unwrap()
});

/// Final RR of accepted exit plans.
pub static EXIT_RR: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "bargate_exit_rr",
        "Risk-reward ratio of accepted exit plans",
        &["method"],
        vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 8.0]
    )
    .unwrap()
});

/// Current daily drawdown (signed, losses negative).
pub static DAILY_DRAWDOWN_PCT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "bargate_daily_drawdown_pct",
        "Current intraday drawdown from day start equity"
    )
    .unwrap()
});

/// Open risk per symbol in account currency.
pub static OPEN_RISK: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "bargate_open_risk",
        "Open risk per symbol in account currency",
        &["symbol"]
    )
    .unwrap()
});

/// Executor round-trip latency.
pub static EXECUTOR_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "bargate_executor_latency_ms",
        "Executor submit latency in milliseconds",
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Bars processed by the pipeline loop.
pub static BARS_PROCESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "bargate_bars_processed_total",
        "Total bars processed"
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record an emitted decision event.
    pub fn decision_event(event: &str, symbol: &str) {
        DECISION_EVENTS_TOTAL
            .with_label_values(&[event, symbol])
            .inc();
    }

    /// Record a clamped exit plan.
    pub fn exit_clamped(symbol: &str, method: &str) {
        EXIT_CLAMPED_TOTAL
            .with_label_values(&[symbol, method])
            .inc();
    }

    /// Record the RR of an accepted exit plan.
    pub fn exit_rr(method: &str, rr: f64) {
        EXIT_RR.with_label_values(&[method]).observe(rr);
    }

    pub fn daily_drawdown(pct: f64) {
        DAILY_DRAWDOWN_PCT.set(pct);
    }

    pub fn open_risk(symbol: &str, amount: f64) {
        OPEN_RISK.with_label_values(&[symbol]).set(amount);
    }

    pub fn executor_latency(latency_ms: f64) {
        EXECUTOR_LATENCY_MS.observe(latency_ms);
    }

    pub fn bar_processed() {
        BARS_PROCESSED_TOTAL.inc();
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write a text-format snapshot for the node exporter textfile collector.
    pub fn write_textfile(path: &Path) -> TelemetryResult<()> {
        let body = Self::render()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
