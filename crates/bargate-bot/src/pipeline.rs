//! DecisionPipeline: runs the gates for one bar, one symbol at a time.
//!
//! Per bar: drawdown guard update, release closed positions, then each
//! symbol strictly in input order. Per symbol:
//! 1. size (rejection stops here, no onboarding counters)
//! 2. plan exits and fit volume to the planned stop, then emit the final
//!    sizing (an exit rejection still emits the provisional one)
//! 3. consult the onboarding gate: observe-only or hand off to the executor
//! 4. record the outcome against the onboarding counters, once per decision

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use bargate_core::{
    BrokerRejectCode, DecisionId, ExitPlan, RejectReason, SizedDecision, Symbol, SymbolSpec,
};
use bargate_executor::{ExecutionOutcome, Executor, OrderRequest, TimeoutExecutor};
use bargate_exit::ExitPlanner;
use bargate_onboarding::{OnboardingGate, SymbolRiskConfig};
use bargate_risk::{DrawdownStatus, RiskSizer};
use bargate_telemetry::{DecisionEvent, EventSink, Metrics};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::bar_source::{BarInput, SymbolBar};
use crate::config::AppConfig;
use crate::error::AppResult;

/// Terminal state of one symbol on one bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// No signal on this bar.
    Idle,
    /// Stopped by a gate before reaching the onboarding check.
    Rejected(RejectReason),
    /// Sized and planned; log-only because the symbol may not execute.
    ObserveOnly {
        decision: SizedDecision,
        plan: ExitPlan,
    },
    /// Accepted by the broker.
    Executed {
        decision: SizedDecision,
        plan: ExitPlan,
        broker_ref: String,
    },
    /// Refused by the broker or timed out.
    BrokerRejected {
        decision: SizedDecision,
        plan: ExitPlan,
        code: BrokerRejectCode,
    },
    /// Already executed on an earlier pass over the same bar.
    AlreadyExecuted(DecisionId),
}

/// Result of processing one bar.
#[derive(Debug, Clone)]
pub struct BarReport {
    pub bar_time: DateTime<Utc>,
    pub drawdown: DrawdownStatus,
    pub released: Vec<(DecisionId, Decimal)>,
    pub outcomes: Vec<(Symbol, SymbolOutcome)>,
}

/// Per-bar orchestrator.
pub struct DecisionPipeline {
    onboarding: OnboardingGate,
    sizer: RiskSizer,
    planner: ExitPlanner,
    executor: TimeoutExecutor<Arc<dyn Executor>>,
    specs: BTreeMap<Symbol, SymbolSpec>,
    per_trade_risk_pct: Decimal,
    sink: Arc<dyn EventSink>,
}

impl DecisionPipeline {
    /// Open every gate and its persisted state.
    ///
    /// Fails if any state file is unreadable: no bar may be processed
    /// against a partially loaded state.
    pub fn open(
        config: &AppConfig,
        sink: Arc<dyn EventSink>,
        executor: Arc<dyn Executor>,
    ) -> AppResult<Self> {
        config.validate()?;
        let onboarding = OnboardingGate::open(config.onboarding.clone())?;
        let sizer = RiskSizer::open(config.risk.clone(), config.drawdown.clone(), sink.clone())?;
        let planner = ExitPlanner::new(config.exit.clone(), sink.clone())?;
        let executor = TimeoutExecutor::new(executor, config.executor.timeout());

        info!(
            symbols = config.symbols.len(),
            executor = executor.name(),
            probation_policy = onboarding.probation_policy_version(),
            "Decision pipeline ready"
        );

        Ok(Self {
            onboarding,
            sizer,
            planner,
            executor,
            specs: config.symbol_specs(),
            per_trade_risk_pct: config.risk.per_trade_risk_pct,
            sink,
        })
    }

    pub fn onboarding(&self) -> &OnboardingGate {
        &self.onboarding
    }

    pub fn sizer(&self) -> &RiskSizer {
        &self.sizer
    }

    /// Process one bar close.
    pub async fn process_bar(&self, bar: &BarInput) -> AppResult<BarReport> {
        let drawdown = self.sizer.on_bar(bar.bar_time, bar.equity)?;
        if drawdown.day_rolled {
            self.onboarding.roll_day();
        }

        let mut released = Vec::new();
        for id in &bar.closed {
            if let Some(risk) = self.sizer.release(id)? {
                released.push((id.clone(), risk));
            }
        }

        let mut outcomes = Vec::with_capacity(bar.symbols.len());
        for symbol_bar in &bar.symbols {
            let outcome = self
                .process_symbol(bar.bar_time, bar.equity, symbol_bar)
                .await?;
            outcomes.push((symbol_bar.symbol.clone(), outcome));
        }

        Metrics::bar_processed();
        debug!(
            bar_time = %bar.bar_time,
            symbols = outcomes.len(),
            released = released.len(),
            "Bar processed"
        );

        Ok(BarReport {
            bar_time: bar.bar_time,
            drawdown,
            released,
            outcomes,
        })
    }

    /// Run one symbol through the gates.
    pub async fn process_symbol(
        &self,
        bar_time: DateTime<Utc>,
        equity: Decimal,
        input: &SymbolBar,
    ) -> AppResult<SymbolOutcome> {
        let Some(signal) = &input.signal else {
            return Ok(SymbolOutcome::Idle);
        };
        let symbol = &input.symbol;
        if signal.symbol != *symbol || signal.bar_time != bar_time {
            warn!(
                %symbol,
                signal_symbol = %signal.symbol,
                signal_time = %signal.bar_time,
                %bar_time,
                "Signal does not belong to this symbol bar; skipped"
            );
            return Ok(SymbolOutcome::Rejected(RejectReason::InvalidSignal));
        }
        let spec = self.spec_for(symbol);

        // Onboarding is advisory here: it may tighten risk but never blocks sizing.
        let risk = self.onboarding.apply_probation_overrides(
            symbol,
            &SymbolRiskConfig {
                per_trade_risk_pct: self.per_trade_risk_pct,
                min_rr: self.planner.default_rr_floor(),
            },
        );

        let budget = self.sizer.budget(equity, risk.per_trade_risk_pct);
        let sized = match self.sizer.size(signal, &budget, &spec) {
            Ok(d) => d,
            Err(rejection) => {
                if rejection.reason.is_halt() {
                    debug!(%symbol, reason = %rejection.reason, "Sizing suppressed by halt");
                } else {
                    info!(
                        %symbol,
                        reason = %rejection.reason,
                        detail = %rejection.detail,
                        "Sizing rejected"
                    );
                }
                return Ok(SymbolOutcome::Rejected(rejection.reason));
            }
        };

        let plan = match self
            .planner
            .plan(&sized, signal, &input.zones, &spec, risk.min_rr)
        {
            Ok(p) => p,
            Err(rejection) => {
                self.sizer.confirm_sized(&sized);
                return Ok(SymbolOutcome::Rejected(rejection.reason));
            }
        };

        let decision = match self.sizer.fit_to_plan(&sized, &plan, &spec) {
            Ok(d) => d,
            Err(rejection) => {
                info!(
                    %symbol,
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "Decision rejected after exit planning"
                );
                return Ok(SymbolOutcome::Rejected(rejection.reason));
            }
        };
        self.sizer.confirm_sized(&decision);

        let state = self.onboarding.get_state(symbol);
        let mut validation_errors = 0u64;
        let outcome = if !state.should_execute() {
            let reason = if state.execute_when_promoted {
                state.state.as_str()
            } else {
                "execute_disabled"
            };
            self.sink.emit(&DecisionEvent::SymbolOnboardingState {
                symbol: symbol.clone(),
                bar_time,
                state: state.state,
                execute: false,
                reason: reason.to_string(),
                sessions_seen: state.sessions_seen,
                trades_seen: state.trades_seen,
                validation_errors: state.validation_errors,
            });
            SymbolOutcome::ObserveOnly { decision, plan }
        } else if self.sizer.ledger().contains(&decision.decision_id) {
            debug!(decision_id = %decision.decision_id, "Decision already executed; not resubmitted");
            return Ok(SymbolOutcome::AlreadyExecuted(decision.decision_id));
        } else {
            let order = OrderRequest::new(&decision, &plan)?;
            // Booked before submit so a live order never lacks its ledger entry.
            self.sizer.record_open_risk(&decision)?;
            let started = Instant::now();
            let result = self.executor.submit(order).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                ExecutionOutcome::Accepted { broker_ref } => {
                    self.sink.emit(&DecisionEvent::OrderSubmitted {
                        decision_id: decision.decision_id.clone(),
                        symbol: symbol.clone(),
                        bar_time,
                        broker_ref: broker_ref.clone(),
                        latency_ms,
                    });
                    SymbolOutcome::Executed {
                        decision,
                        plan,
                        broker_ref,
                    }
                }
                ExecutionOutcome::Rejected { code } => {
                    self.sink.emit(&DecisionEvent::OrderRejected {
                        decision_id: decision.decision_id.clone(),
                        symbol: symbol.clone(),
                        bar_time,
                        code,
                    });
                    self.sizer.release(&decision.decision_id)?;
                    validation_errors += 1;
                    SymbolOutcome::BrokerRejected {
                        decision,
                        plan,
                        code,
                    }
                }
            }
        };

        if self
            .onboarding
            .record_decision(&signal.decision_id(), symbol, input.session_present, validation_errors)?
            .is_some()
        {
            self.onboarding.evaluate_promotion(symbol, bar_time)?;
        }
        Ok(outcome)
    }

    fn spec_for(&self, symbol: &Symbol) -> SymbolSpec {
        match self.specs.get(symbol) {
            Some(spec) => spec.clone(),
            None => {
                debug!(%symbol, "No broker spec configured; using defaults");
                SymbolSpec::default()
            }
        }
    }
}
