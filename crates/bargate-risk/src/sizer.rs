//! RiskSizer: converts a signal into a sized order within the risk budget.
//!
//! Check order is fixed: drawdown veto, signal validity, volume floor,
//! per-symbol open-risk cap. The first failing check wins.

use std::collections::HashSet;
use std::sync::Arc;

use bargate_core::{
    DecisionId, ExitPlan, RejectReason, Signal, SizedDecision, Symbol, SymbolSpec, Volume,
};
use bargate_persistence::StateFile;
use bargate_telemetry::{DecisionEvent, EventSink};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::{DrawdownConfig, RiskConfig};
use crate::drawdown::{DrawdownGuard, DrawdownStatus};
use crate::error::RiskResult;
use crate::ledger::OpenRiskLedger;

// ============================================================================
// RiskBudget
// ============================================================================

/// Risk limits for one bar, derived from current equity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskBudget {
    pub account_equity: Decimal,
    pub per_trade_risk_pct: Decimal,
    pub daily_soft_stop_pct: Decimal,
    pub daily_hard_stop_pct: Decimal,
    pub max_total_loss_pct: Decimal,
    /// Per-symbol open risk cap in account currency.
    pub per_symbol_open_risk_cap: Decimal,
}

impl RiskBudget {
    /// Derive the budget. `per_trade_risk_pct` is the probation-adjusted value.
    pub fn derive(
        account_equity: Decimal,
        per_trade_risk_pct: Decimal,
        risk: &RiskConfig,
        drawdown: &DrawdownConfig,
    ) -> Self {
        Self {
            account_equity,
            per_trade_risk_pct,
            daily_soft_stop_pct: drawdown.daily_soft_stop_pct,
            daily_hard_stop_pct: drawdown.daily_hard_stop_pct,
            max_total_loss_pct: drawdown.max_total_loss_pct,
            per_symbol_open_risk_cap: account_equity * risk.per_symbol_open_risk_cap_pct,
        }
    }
}

/// Expected sizing outcome other than success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizingRejection {
    pub decision_id: DecisionId,
    pub reason: RejectReason,
    pub detail: String,
}

impl SizingRejection {
    fn new(decision_id: DecisionId, reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            decision_id,
            reason,
            detail: detail.into(),
        }
    }
}

// ============================================================================
// RiskSizer
// ============================================================================

/// Risk sizer.
///
/// Owns the drawdown guard and the open-risk ledger so the veto, the cap and
/// the bookkeeping all see one consistent view.
pub struct RiskSizer {
    config: RiskConfig,
    drawdown_config: DrawdownConfig,
    guard: DrawdownGuard,
    ledger: OpenRiskLedger,
    /// Decisions whose `execution_sized` event was already emitted today.
    emitted: Mutex<HashSet<DecisionId>>,
    sink: Arc<dyn EventSink>,
}

impl RiskSizer {
    /// Open the sizer, loading the drawdown state and open-risk ledger.
    pub fn open(
        config: RiskConfig,
        drawdown_config: DrawdownConfig,
        sink: Arc<dyn EventSink>,
    ) -> RiskResult<Self> {
        config.validate()?;
        let guard = DrawdownGuard::open(drawdown_config.clone(), sink.clone())?;
        let ledger = OpenRiskLedger::open(StateFile::new(config.ledger_path.clone()))?;
        Ok(Self {
            config,
            drawdown_config,
            guard,
            ledger,
            emitted: Mutex::new(HashSet::new()),
            sink,
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn guard(&self) -> &DrawdownGuard {
        &self.guard
    }

    pub fn ledger(&self) -> &OpenRiskLedger {
        &self.ledger
    }

    /// Update the drawdown guard for a new bar.
    pub fn on_bar(&self, bar_time: DateTime<Utc>, equity: Decimal) -> RiskResult<DrawdownStatus> {
        let status = self.guard.on_bar(bar_time, equity)?;
        if status.day_rolled {
            self.emitted.lock().clear();
        }
        Ok(status)
    }

    /// Budget for this bar at the given (probation-adjusted) per-trade risk.
    pub fn budget(&self, account_equity: Decimal, per_trade_risk_pct: Decimal) -> RiskBudget {
        RiskBudget::derive(
            account_equity,
            per_trade_risk_pct,
            &self.config,
            &self.drawdown_config,
        )
    }

    /// Size a signal.
    ///
    /// Volume is floored to the broker step, so realized risk never exceeds
    /// `equity × per_trade_risk_pct`. The result is provisional until
    /// [`Self::fit_to_plan`]; call [`Self::confirm_sized`] with the final
    /// decision.
    pub fn size(
        &self,
        signal: &Signal,
        budget: &RiskBudget,
        spec: &SymbolSpec,
    ) -> Result<SizedDecision, SizingRejection> {
        let decision_id = signal.decision_id();

        if let Some(reason) = self.guard.veto() {
            debug!(%decision_id, %reason, "Sizing vetoed by drawdown guard");
            return Err(SizingRejection::new(
                decision_id,
                reason,
                "drawdown guard halt active",
            ));
        }

        if let Err(e) = signal.validate() {
            return Err(SizingRejection::new(
                decision_id,
                RejectReason::InvalidSignal,
                e.to_string(),
            ));
        }

        let multiplier = self.guard.risk_multiplier();
        let risk_amount = budget.account_equity * budget.per_trade_risk_pct * multiplier;
        let unit_risk = signal.stop_distance * spec.value_per_unit;

        let volume = Self::volume_for(risk_amount, unit_risk, spec);
        if volume.is_zero() || volume.inner() < spec.min_volume {
            self.sink.emit(&DecisionEvent::RiskTooSmall {
                decision_id: decision_id.clone(),
                symbol: signal.symbol.clone(),
                bar_time: signal.bar_time,
                risk_amount,
                stop_distance: signal.stop_distance,
                volume,
                min_volume: spec.min_volume,
            });
            return Err(SizingRejection::new(
                decision_id,
                RejectReason::RiskTooSmall,
                format!("volume {volume} below minimum {}", spec.min_volume),
            ));
        }

        let realized_risk = volume * unit_risk;
        let open_risk = self
            .ledger
            .open_risk_excluding(&signal.symbol, &decision_id);
        let cap = budget.per_symbol_open_risk_cap;
        if open_risk + realized_risk > cap {
            self.sink.emit(&DecisionEvent::RiskCapHit {
                decision_id: decision_id.clone(),
                symbol: signal.symbol.clone(),
                bar_time: signal.bar_time,
                open_risk,
                trade_risk: realized_risk,
                cap,
            });
            return Err(SizingRejection::new(
                decision_id,
                RejectReason::RiskCapHit,
                format!("open {open_risk} + trade {realized_risk} > cap {cap}"),
            ));
        }

        Ok(SizedDecision {
            decision_id,
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            bar_time: signal.bar_time,
            entry_price: signal.entry_price,
            stop_distance: signal.stop_distance,
            volume,
            risk_amount,
            realized_risk,
            open_risk_budget_remaining: cap - open_risk - realized_risk,
        })
    }

    /// Emit `execution_sized` for the final decision, once per decision id.
    ///
    /// Returns `false` if the event was already emitted for this id today.
    pub fn confirm_sized(&self, decision: &SizedDecision) -> bool {
        if !self.emitted.lock().insert(decision.decision_id.clone()) {
            debug!(decision_id = %decision.decision_id, "Sizing repeated; execution_sized already emitted");
            return false;
        }
        let multiplier = self.guard.risk_multiplier();
        self.sink
            .emit(&DecisionEvent::execution_sized(decision, multiplier));
        true
    }

    /// Re-fit volume to the planned stop.
    ///
    /// A wider final stop re-floors the volume so realized risk stays within
    /// `risk_amount`; a narrower one keeps the volume and lowers realized risk.
    /// Rejections emit `risk_too_small` / `risk_cap_hit` like [`Self::size`].
    pub fn fit_to_plan(
        &self,
        decision: &SizedDecision,
        plan: &ExitPlan,
        spec: &SymbolSpec,
    ) -> Result<SizedDecision, SizingRejection> {
        let final_stop = plan.final_stop_distance();
        let unit_risk = final_stop * spec.value_per_unit;

        let volume = if final_stop > decision.stop_distance {
            let refit = Self::volume_for(decision.risk_amount, unit_risk, spec).min(decision.volume);
            if refit.is_zero() || refit.inner() < spec.min_volume {
                self.sink.emit(&DecisionEvent::RiskTooSmall {
                    decision_id: decision.decision_id.clone(),
                    symbol: decision.symbol.clone(),
                    bar_time: decision.bar_time,
                    risk_amount: decision.risk_amount,
                    stop_distance: final_stop,
                    volume: refit,
                    min_volume: spec.min_volume,
                });
                return Err(SizingRejection::new(
                    decision.decision_id.clone(),
                    RejectReason::RiskTooSmall,
                    format!("volume {refit} below minimum after widening stop to {final_stop}"),
                ));
            }
            info!(
                decision_id = %decision.decision_id,
                from = %decision.volume,
                to = %refit,
                %final_stop,
                "Volume refit to planned stop"
            );
            refit
        } else {
            decision.volume
        };

        let realized_risk = volume * unit_risk;
        let remaining = decision.open_risk_budget_remaining + decision.realized_risk - realized_risk;
        if remaining < Decimal::ZERO {
            let open_risk = self
                .ledger
                .open_risk_excluding(&decision.symbol, &decision.decision_id);
            self.sink.emit(&DecisionEvent::RiskCapHit {
                decision_id: decision.decision_id.clone(),
                symbol: decision.symbol.clone(),
                bar_time: decision.bar_time,
                open_risk,
                trade_risk: realized_risk,
                cap: open_risk + decision.open_risk_budget_remaining + decision.realized_risk,
            });
            return Err(SizingRejection::new(
                decision.decision_id.clone(),
                RejectReason::RiskCapHit,
                format!("refit risk {realized_risk} exceeds remaining cap"),
            ));
        }

        Ok(SizedDecision {
            stop_distance: final_stop,
            volume,
            realized_risk,
            open_risk_budget_remaining: remaining,
            ..decision.clone()
        })
    }

    /// Book an executed decision's risk against its symbol.
    pub fn record_open_risk(&self, decision: &SizedDecision) -> RiskResult<bool> {
        self.ledger
            .record(&decision.symbol, &decision.decision_id, decision.realized_risk)
    }

    /// Release a closed position.
    pub fn release(&self, decision_id: &DecisionId) -> RiskResult<Option<Decimal>> {
        self.ledger.release(decision_id)
    }

    pub fn open_risk(&self, symbol: &Symbol) -> Decimal {
        self.ledger.open_risk(symbol)
    }

    /// Floor `risk / unit_risk` to the volume step, then cap at `max_volume`.
    fn volume_for(risk_amount: Decimal, unit_risk: Decimal, spec: &SymbolSpec) -> Volume {
        if unit_risk <= Decimal::ZERO || risk_amount <= Decimal::ZERO {
            return Volume::ZERO;
        }
        let raw = Volume::new(risk_amount / unit_risk).floor_to_step(spec.volume_step);
        match spec.max_volume {
            Some(max) => raw.min(Volume::new(max).floor_to_step(spec.volume_step)),
            None => raw,
        }
    }
}
