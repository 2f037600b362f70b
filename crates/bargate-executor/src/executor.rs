//! Executor trait and the in-workspace implementations.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bargate_core::{
    BrokerRejectCode, DecisionId, Direction, ExitPlan, Price, SizedDecision, Symbol, Volume,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ExecutorError, ExecutorResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Final sized and planned order handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub decision_id: DecisionId,
    pub symbol: Symbol,
    pub direction: Direction,
    pub bar_time: DateTime<Utc>,
    pub volume: Volume,
    pub entry_price: Price,
    pub stop_loss: Price,
    pub take_profit: Price,
}

impl OrderRequest {
    /// Build from a sized decision and its accepted exit plan.
    pub fn new(decision: &SizedDecision, plan: &ExitPlan) -> ExecutorResult<Self> {
        if decision.volume.is_zero() {
            return Err(ExecutorError::InvalidOrder(format!(
                "{}: zero volume",
                decision.decision_id
            )));
        }
        Ok(Self {
            decision_id: decision.decision_id.clone(),
            symbol: decision.symbol.clone(),
            direction: decision.direction,
            bar_time: decision.bar_time,
            volume: decision.volume,
            entry_price: plan.entry,
            stop_loss: plan.sl_final,
            take_profit: plan.tp_final,
        })
    }
}

/// Result of one broker hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Broker accepted the order.
    Accepted { broker_ref: String },
    /// Broker refused the order, or the call did not complete in time.
    Rejected { code: BrokerRejectCode },
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Broker seam.
///
/// Implementations report every broker failure as `Rejected`; they never
/// panic or return errors for expected broker behaviour.
pub trait Executor: Send + Sync {
    /// Submit one order.
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, ExecutionOutcome>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ============================================================================
// TimeoutExecutor
// ============================================================================

/// Bounds every submit to `timeout`.
pub struct TimeoutExecutor<E> {
    inner: E,
    timeout: Duration,
}

impl<E: Executor> TimeoutExecutor<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: Executor> Executor for TimeoutExecutor<E> {
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, ExecutionOutcome> {
        Box::pin(async move {
            let decision_id = order.decision_id.clone();
            match tokio::time::timeout(self.timeout, self.inner.submit(order)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        %decision_id,
                        executor = self.inner.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Broker hand-off timed out"
                    );
                    ExecutionOutcome::Rejected {
                        code: BrokerRejectCode::Timeout,
                    }
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, ExecutionOutcome> {
        (**self).submit(order)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// ============================================================================
// DryRunExecutor
// ============================================================================

/// Accepts every order and logs it. No broker is contacted.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    submitted: AtomicU64,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl Executor for DryRunExecutor {
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, ExecutionOutcome> {
        Box::pin(async move {
            self.submitted.fetch_add(1, Ordering::Relaxed);
            info!(
                decision_id = %order.decision_id,
                symbol = %order.symbol,
                direction = %order.direction,
                volume = %order.volume,
                stop_loss = %order.stop_loss,
                take_profit = %order.take_profit,
                "[DRY-RUN] Order accepted"
            );
            ExecutionOutcome::Accepted {
                broker_ref: format!("dry-run:{}", order.decision_id),
            }
        })
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}

// ============================================================================
// MockExecutor
// ============================================================================

/// Mock executor for testing.
#[derive(Debug)]
pub struct MockExecutor {
    /// Recorded submissions for verification.
    submissions: Mutex<Vec<OrderRequest>>,
    /// Result returned by every submit.
    next_outcome: Mutex<ExecutionOutcome>,
    /// Artificial broker latency.
    delay: Mutex<Option<Duration>>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            next_outcome: Mutex::new(ExecutionOutcome::Accepted {
                broker_ref: "mock".to_string(),
            }),
            delay: Mutex::new(None),
        }
    }

    pub fn set_next_outcome(&self, outcome: ExecutionOutcome) {
        *self.next_outcome.lock() = outcome;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn submissions(&self) -> Vec<OrderRequest> {
        self.submissions.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }
}

impl Executor for MockExecutor {
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, ExecutionOutcome> {
        let delay = *self.delay.lock();
        let outcome = self.next_outcome.lock().clone();
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            self.submissions.lock().push(order);
            outcome
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bargate_core::ExitMethod;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn order() -> OrderRequest {
        let symbol = Symbol::from("EURUSD");
        let bar_time = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let decision = SizedDecision {
            decision_id: DecisionId::new(&symbol, bar_time),
            symbol,
            direction: Direction::Buy,
            bar_time,
            entry_price: Price::new(dec!(1.1000)),
            stop_distance: dec!(0.0010),
            volume: Volume::new(dec!(0.5)),
            risk_amount: dec!(50),
            realized_risk: dec!(50),
            open_risk_budget_remaining: dec!(50),
        };
        let plan = ExitPlan {
            method: ExitMethod::AtrFallback,
            entry: Price::new(dec!(1.1000)),
            sl_requested: Price::new(dec!(1.0990)),
            sl_final: Price::new(dec!(1.0990)),
            tp_requested: Price::new(dec!(1.1022)),
            tp_final: Price::new(dec!(1.1022)),
            clamped: false,
            rr: dec!(2.2),
            rr_floor: dec!(2),
        };
        OrderRequest::new(&decision, &plan).unwrap()
    }

    #[test]
    fn test_order_uses_final_levels() {
        let o = order();
        assert_eq!(o.stop_loss.inner(), dec!(1.0990));
        assert_eq!(o.take_profit.inner(), dec!(1.1022));
        assert_eq!(o.volume.inner(), dec!(0.5));
    }

    #[test]
    fn test_dry_run_accepts() {
        let exec = DryRunExecutor::new();
        let outcome = tokio_test::block_on(exec.submit(order()));
        assert!(outcome.is_accepted());
        assert_eq!(exec.submitted(), 1);
    }

    #[tokio::test]
    async fn test_mock_records_and_rejects() {
        let mock = MockExecutor::new();
        mock.set_next_outcome(ExecutionOutcome::Rejected {
            code: BrokerRejectCode::InvalidStops,
        });

        let outcome = mock.submit(order()).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::Rejected {
                code: BrokerRejectCode::InvalidStops
            }
        );
        assert_eq!(mock.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_rejection() {
        let mock = MockExecutor::new();
        mock.set_delay(Duration::from_millis(500));
        let exec = TimeoutExecutor::new(mock, Duration::from_millis(20));

        let outcome = exec.submit(order()).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::Rejected {
                code: BrokerRejectCode::Timeout
            }
        );
        // cancelled before the mock recorded it
        assert_eq!(exec.inner().submission_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_passes_fast_outcome() {
        let exec = TimeoutExecutor::new(MockExecutor::new(), Duration::from_millis(500));
        assert!(exec.submit(order()).await.is_accepted());
    }
}
