//! Structured decision events and the sinks that receive them.
//!
//! Event names and field sets are a stable contract with dashboards and
//! audit tooling: `clamped` and `rr` are always present on `exit_planned`,
//! and `execution_sized` appears exactly once per accepted sizing.

use std::sync::Arc;

use bargate_core::{
    BrokerRejectCode, DecisionId, Direction, ExitMethod, ExitPlan, OnboardingStatus, Price,
    SizedDecision, Symbol, Volume,
};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;

/// Metric label for account-level events.
const ACCOUNT_LABEL: &str = "_account";

// ============================================================================
// DecisionEvent
// ============================================================================

/// Which drawdown limit halted new entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltKind {
    /// Daily hard stop; clears at the next trading day.
    Daily,
    /// Total loss limit; clears only on manual reset.
    Total,
}

/// One observable outcome of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecisionEvent {
    RiskTooSmall {
        decision_id: DecisionId,
        symbol: Symbol,
        bar_time: DateTime<Utc>,
        risk_amount: Decimal,
        stop_distance: Decimal,
        volume: Volume,
        min_volume: Decimal,
    },
    RiskCapHit {
        decision_id: DecisionId,
        symbol: Symbol,
        bar_time: DateTime<Utc>,
        open_risk: Decimal,
        trade_risk: Decimal,
        cap: Decimal,
    },
    DrawdownWarning {
        trading_day: NaiveDate,
        bar_time: DateTime<Utc>,
        day_start_equity: Decimal,
        intraday_low: Decimal,
        drawdown_pct: Decimal,
        threshold_pct: Decimal,
        risk_multiplier: Decimal,
    },
    DrawdownHalt {
        kind: HaltKind,
        trading_day: NaiveDate,
        bar_time: DateTime<Utc>,
        drawdown_pct: Decimal,
        threshold_pct: Decimal,
    },
    ExecutionSized {
        decision_id: DecisionId,
        symbol: Symbol,
        direction: Direction,
        bar_time: DateTime<Utc>,
        entry_price: Price,
        stop_distance: Decimal,
        volume: Volume,
        risk_amount: Decimal,
        realized_risk: Decimal,
        open_risk_budget_remaining: Decimal,
        risk_multiplier: Decimal,
    },
    ExitPlanned {
        decision_id: DecisionId,
        symbol: Symbol,
        bar_time: DateTime<Utc>,
        method: ExitMethod,
        entry: Price,
        sl_requested: Price,
        sl_final: Price,
        tp_requested: Price,
        tp_final: Price,
        clamped: bool,
        rr: Decimal,
        rr_floor: Decimal,
    },
    NoValidExit {
        decision_id: DecisionId,
        symbol: Symbol,
        bar_time: DateTime<Utc>,
        rr_floor: Decimal,
        candidates_considered: usize,
    },
    SymbolOnboardingState {
        symbol: Symbol,
        bar_time: DateTime<Utc>,
        state: OnboardingStatus,
        execute: bool,
        reason: String,
        sessions_seen: u64,
        trades_seen: u64,
        validation_errors: u64,
    },
    OrderSubmitted {
        decision_id: DecisionId,
        symbol: Symbol,
        bar_time: DateTime<Utc>,
        broker_ref: String,
        latency_ms: u64,
    },
    OrderRejected {
        decision_id: DecisionId,
        symbol: Symbol,
        bar_time: DateTime<Utc>,
        code: BrokerRejectCode,
    },
}

impl DecisionEvent {
    /// Build an `execution_sized` event from an accepted sizing.
    pub fn execution_sized(decision: &SizedDecision, risk_multiplier: Decimal) -> Self {
        Self::ExecutionSized {
            decision_id: decision.decision_id.clone(),
            symbol: decision.symbol.clone(),
            direction: decision.direction,
            bar_time: decision.bar_time,
            entry_price: decision.entry_price,
            stop_distance: decision.stop_distance,
            volume: decision.volume,
            risk_amount: decision.risk_amount,
            realized_risk: decision.realized_risk,
            open_risk_budget_remaining: decision.open_risk_budget_remaining,
            risk_multiplier,
        }
    }

    /// Build an `exit_planned` event from an accepted plan.
    pub fn exit_planned(decision: &SizedDecision, plan: &ExitPlan) -> Self {
        Self::ExitPlanned {
            decision_id: decision.decision_id.clone(),
            symbol: decision.symbol.clone(),
            bar_time: decision.bar_time,
            method: plan.method,
            entry: plan.entry,
            sl_requested: plan.sl_requested,
            sl_final: plan.sl_final,
            tp_requested: plan.tp_requested,
            tp_final: plan.tp_final,
            clamped: plan.clamped,
            rr: plan.rr,
            rr_floor: plan.rr_floor,
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RiskTooSmall { .. } => "risk_too_small",
            Self::RiskCapHit { .. } => "risk_cap_hit",
            Self::DrawdownWarning { .. } => "drawdown_warning",
            Self::DrawdownHalt { .. } => "drawdown_halt",
            Self::ExecutionSized { .. } => "execution_sized",
            Self::ExitPlanned { .. } => "exit_planned",
            Self::NoValidExit { .. } => "no_valid_exit",
            Self::SymbolOnboardingState { .. } => "symbol_onboarding_state",
            Self::OrderSubmitted { .. } => "order_submitted",
            Self::OrderRejected { .. } => "order_rejected",
        }
    }

    /// Bar close time the event belongs to.
    pub fn bar_time(&self) -> DateTime<Utc> {
        match self {
            Self::RiskTooSmall { bar_time, .. }
            | Self::RiskCapHit { bar_time, .. }
            | Self::DrawdownWarning { bar_time, .. }
            | Self::DrawdownHalt { bar_time, .. }
            | Self::ExecutionSized { bar_time, .. }
            | Self::ExitPlanned { bar_time, .. }
            | Self::NoValidExit { bar_time, .. }
            | Self::SymbolOnboardingState { bar_time, .. }
            | Self::OrderSubmitted { bar_time, .. }
            | Self::OrderRejected { bar_time, .. } => *bar_time,
        }
    }

    /// Symbol the event concerns; `None` for account-level events.
    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::RiskTooSmall { symbol, .. }
            | Self::RiskCapHit { symbol, .. }
            | Self::ExecutionSized { symbol, .. }
            | Self::ExitPlanned { symbol, .. }
            | Self::NoValidExit { symbol, .. }
            | Self::SymbolOnboardingState { symbol, .. }
            | Self::OrderSubmitted { symbol, .. }
            | Self::OrderRejected { symbol, .. } => Some(symbol),
            Self::DrawdownWarning { .. } | Self::DrawdownHalt { .. } => None,
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Receiver of decision events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DecisionEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: &DecisionEvent) {
        (**self).emit(event)
    }
}

/// Logs each event at its severity and updates Prometheus metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &DecisionEvent) {
        let symbol_label = event.symbol().map(|s| s.as_str()).unwrap_or(ACCOUNT_LABEL);
        Metrics::decision_event(event.name(), symbol_label);

        match event {
            DecisionEvent::RiskTooSmall {
                decision_id,
                risk_amount,
                volume,
                min_volume,
                ..
            } => {
                info!(
                    event = "risk_too_small",
                    %decision_id,
                    %risk_amount,
                    %volume,
                    %min_volume,
                    "Sizing rejected: volume below broker minimum"
                );
            }
            DecisionEvent::RiskCapHit {
                decision_id,
                open_risk,
                trade_risk,
                cap,
                ..
            } => {
                warn!(
                    event = "risk_cap_hit",
                    %decision_id,
                    %open_risk,
                    %trade_risk,
                    %cap,
                    "Sizing rejected: per-symbol open risk cap"
                );
            }
            DecisionEvent::DrawdownWarning {
                trading_day,
                drawdown_pct,
                threshold_pct,
                risk_multiplier,
                ..
            } => {
                Metrics::daily_drawdown(drawdown_pct.to_f64().unwrap_or(0.0));
                warn!(
                    event = "drawdown_warning",
                    %trading_day,
                    %drawdown_pct,
                    %threshold_pct,
                    %risk_multiplier,
                    "Daily soft stop breached"
                );
            }
            DecisionEvent::DrawdownHalt {
                kind,
                trading_day,
                drawdown_pct,
                threshold_pct,
                ..
            } => {
                error!(
                    event = "drawdown_halt",
                    ?kind,
                    %trading_day,
                    %drawdown_pct,
                    %threshold_pct,
                    "DRAWDOWN HALT: new entries suppressed"
                );
            }
            DecisionEvent::ExecutionSized {
                decision_id,
                volume,
                risk_amount,
                realized_risk,
                open_risk_budget_remaining,
                ..
            } => {
                info!(
                    event = "execution_sized",
                    %decision_id,
                    %volume,
                    %risk_amount,
                    %realized_risk,
                    %open_risk_budget_remaining,
                    "Decision sized"
                );
            }
            DecisionEvent::ExitPlanned {
                decision_id,
                symbol,
                method,
                sl_final,
                tp_final,
                clamped,
                rr,
                ..
            } => {
                if *clamped {
                    Metrics::exit_clamped(symbol.as_str(), method.as_str());
                }
                Metrics::exit_rr(method.as_str(), rr.to_f64().unwrap_or(0.0));
                info!(
                    event = "exit_planned",
                    %decision_id,
                    %method,
                    %sl_final,
                    %tp_final,
                    clamped,
                    %rr,
                    "Exit planned"
                );
            }
            DecisionEvent::NoValidExit {
                decision_id,
                rr_floor,
                candidates_considered,
                ..
            } => {
                info!(
                    event = "no_valid_exit",
                    %decision_id,
                    %rr_floor,
                    candidates_considered,
                    "No exit method met the RR floor"
                );
            }
            DecisionEvent::SymbolOnboardingState {
                symbol,
                state,
                execute,
                reason,
                trades_seen,
                ..
            } => {
                info!(
                    event = "symbol_onboarding_state",
                    %symbol,
                    %state,
                    execute,
                    %reason,
                    trades_seen,
                    "Onboarding state"
                );
            }
            DecisionEvent::OrderSubmitted {
                decision_id,
                broker_ref,
                latency_ms,
                ..
            } => {
                Metrics::executor_latency(*latency_ms as f64);
                info!(
                    event = "order_submitted",
                    %decision_id,
                    %broker_ref,
                    latency_ms,
                    "Order accepted by broker"
                );
            }
            DecisionEvent::OrderRejected {
                decision_id, code, ..
            } => {
                warn!(
                    event = "order_rejected",
                    %decision_id,
                    %code,
                    "Order rejected by broker"
                );
            }
        }
    }
}

/// Records events in memory. Used by tests and the `status` command.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DecisionEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<DecisionEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events with the given name.
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &DecisionEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forwards each event to every inner sink, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &DecisionEvent) {
        debug!(event = event.name(), sinks = self.sinks.len(), "Fanning out event");
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
