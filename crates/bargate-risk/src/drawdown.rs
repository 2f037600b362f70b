//! Daily and total drawdown guard.
//!
//! The daily window opens at the first bar of each trading day, capturing the
//! bar's equity as `day_start_equity`. A skipped day is never backfilled and a
//! bar from an earlier day never reopens an older window.

use std::sync::Arc;

use bargate_core::RejectReason;
use bargate_persistence::StateFile;
use bargate_telemetry::{DecisionEvent, EventSink, HaltKind, Metrics};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DrawdownConfig;
use crate::error::{RiskError, RiskResult};
use crate::halt::{HaltLatch, HaltReason, HaltRecord};

/// Trading day a bar belongs to, given the UTC reset boundary.
pub fn trading_day(bar_time: DateTime<Utc>, reset: NaiveTime) -> NaiveDate {
    let date = bar_time.date_naive();
    if bar_time.time() >= reset {
        date
    } else {
        date.pred_opt().unwrap_or(date)
    }
}

/// Equity window for one trading day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEquityWindow {
    pub trading_day: NaiveDate,
    pub day_start_equity: Decimal,
    pub intraday_low: Decimal,
    /// Soft stop breached today.
    pub soft_breached: bool,
    /// Hard stop breached today; no new entries until the next trading day.
    pub hard_stopped: bool,
}

impl DailyEquityWindow {
    fn open(trading_day: NaiveDate, equity: Decimal) -> Self {
        Self {
            trading_day,
            day_start_equity: equity,
            intraday_low: equity,
            soft_breached: false,
            hard_stopped: false,
        }
    }

    /// `(intraday_low - day_start_equity) / day_start_equity`, signed.
    pub fn drawdown_pct(&self) -> Decimal {
        if self.day_start_equity.is_zero() {
            return Decimal::ZERO;
        }
        (self.intraday_low - self.day_start_equity) / self.day_start_equity
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedDrawdown {
    #[serde(default)]
    window: Option<DailyEquityWindow>,
    #[serde(default)]
    halt: Option<HaltRecord>,
}

/// Result of updating the guard with a bar's equity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawdownStatus {
    pub trading_day: NaiveDate,
    pub drawdown_pct: Decimal,
    /// A new trading day window was opened by this bar.
    pub day_rolled: bool,
    /// Veto applied to every sizing call until cleared.
    pub veto: Option<RejectReason>,
    pub risk_multiplier: Decimal,
}

/// Daily/total drawdown guard.
pub struct DrawdownGuard {
    config: DrawdownConfig,
    reset_time: NaiveTime,
    store: StateFile,
    window: Mutex<Option<DailyEquityWindow>>,
    halt: HaltLatch,
    sink: Arc<dyn EventSink>,
}

impl DrawdownGuard {
    /// Open the guard, restoring the window and halt latch from disk.
    pub fn open(config: DrawdownConfig, sink: Arc<dyn EventSink>) -> RiskResult<Self> {
        config.validate()?;
        let reset_time = config.reset_time()?;
        let store = StateFile::new(config.state_path.clone());
        let persisted: PersistedDrawdown = store.load()?.unwrap_or_default();

        if let Some(w) = &persisted.window {
            info!(
                trading_day = %w.trading_day,
                day_start_equity = %w.day_start_equity,
                intraday_low = %w.intraday_low,
                hard_stopped = w.hard_stopped,
                "Drawdown window restored"
            );
        }

        Ok(Self {
            config,
            reset_time,
            store,
            window: Mutex::new(persisted.window),
            halt: HaltLatch::restored(persisted.halt),
            sink,
        })
    }

    /// Update with the equity observed at `bar_time`.
    pub fn on_bar(&self, bar_time: DateTime<Utc>, equity: Decimal) -> RiskResult<DrawdownStatus> {
        if equity <= Decimal::ZERO {
            return Err(RiskError::InvalidEquity(format!(
                "equity {equity} at {bar_time} must be positive"
            )));
        }

        let day = trading_day(bar_time, self.reset_time);
        let mut guard = self.window.lock();
        let needs_reset = match guard.as_ref() {
            Some(w) if w.trading_day == day => false,
            Some(w) if w.trading_day > day => {
                warn!(
                    bar_day = %day,
                    window_day = %w.trading_day,
                    "Bar from an earlier trading day; window kept"
                );
                false
            }
            previous => {
                info!(
                    trading_day = %day,
                    previous_day = ?previous.map(|w| w.trading_day),
                    day_start_equity = %equity,
                    "Daily equity window reset"
                );
                true
            }
        };
        if needs_reset {
            *guard = Some(DailyEquityWindow::open(day, equity));
        }
        let day_rolled = needs_reset;
        let window = guard.get_or_insert_with(|| DailyEquityWindow::open(day, equity));

        if equity < window.intraday_low {
            window.intraday_low = equity;
        }
        let dd = window.drawdown_pct();
        Metrics::daily_drawdown(dd.to_f64().unwrap_or(0.0));

        if dd.is_sign_negative() {
            if !window.hard_stopped && dd.abs() >= self.config.daily_hard_stop_pct.abs() {
                window.hard_stopped = true;
                self.sink.emit(&DecisionEvent::DrawdownHalt {
                    kind: HaltKind::Daily,
                    trading_day: day,
                    bar_time,
                    drawdown_pct: dd,
                    threshold_pct: self.config.daily_hard_stop_pct,
                });
            }
            if !window.soft_breached && dd.abs() >= self.config.daily_soft_stop_pct.abs() {
                window.soft_breached = true;
                self.sink.emit(&DecisionEvent::DrawdownWarning {
                    trading_day: day,
                    bar_time,
                    day_start_equity: window.day_start_equity,
                    intraday_low: window.intraday_low,
                    drawdown_pct: dd,
                    threshold_pct: self.config.daily_soft_stop_pct,
                    risk_multiplier: self.config.soft_stop_risk_multiplier,
                });
            }
        }

        let total = (equity - self.config.initial_balance) / self.config.initial_balance;
        if total.is_sign_negative() && total.abs() >= self.config.max_total_loss_pct.abs() {
            let reason = HaltReason::TotalLoss {
                loss_pct: total,
                threshold_pct: self.config.max_total_loss_pct,
            };
            if self.halt.trigger(reason, bar_time) {
                self.sink.emit(&DecisionEvent::DrawdownHalt {
                    kind: HaltKind::Total,
                    trading_day: day,
                    bar_time,
                    drawdown_pct: total,
                    threshold_pct: self.config.max_total_loss_pct,
                });
            }
        }

        let snapshot = window.clone();
        drop(guard);
        self.persist(Some(snapshot.clone()))?;

        let status = DrawdownStatus {
            trading_day: day,
            drawdown_pct: dd,
            day_rolled,
            veto: self.veto_for(Some(&snapshot)),
            risk_multiplier: Self::multiplier_for(&self.config, Some(&snapshot)),
        };
        debug!(
            trading_day = %status.trading_day,
            drawdown_pct = %status.drawdown_pct,
            veto = ?status.veto,
            "Drawdown guard updated"
        );
        Ok(status)
    }

    /// Hard veto applied before any per-symbol check.
    pub fn veto(&self) -> Option<RejectReason> {
        let window = self.window.lock();
        self.veto_for(window.as_ref())
    }

    /// Multiplier on new-entry risk (below 1 only after the soft stop).
    pub fn risk_multiplier(&self) -> Decimal {
        let window = self.window.lock();
        Self::multiplier_for(&self.config, window.as_ref())
    }

    /// Current window, if any bar has been seen.
    pub fn window(&self) -> Option<DailyEquityWindow> {
        self.window.lock().clone()
    }

    pub fn halt_record(&self) -> Option<HaltRecord> {
        self.halt.record()
    }

    /// Operator action: clear the total-loss latch and persist.
    pub fn reset_halt(&self) -> RiskResult<()> {
        self.halt.reset();
        let window = self.window.lock().clone();
        self.persist(window)
    }

    fn veto_for(&self, window: Option<&DailyEquityWindow>) -> Option<RejectReason> {
        if self.halt.is_triggered() {
            return Some(RejectReason::TotalLossHalt);
        }
        match window {
            Some(w) if w.hard_stopped => Some(RejectReason::DailyDrawdownHalt),
            _ => None,
        }
    }

    fn multiplier_for(config: &DrawdownConfig, window: Option<&DailyEquityWindow>) -> Decimal {
        match window {
            Some(w) if w.soft_breached => config.soft_stop_risk_multiplier,
            _ => Decimal::ONE,
        }
    }

    fn persist(&self, window: Option<DailyEquityWindow>) -> RiskResult<()> {
        let state = PersistedDrawdown {
            window,
            halt: self.halt.record(),
        };
        self.store.save(&state)?;
        Ok(())
    }
}
