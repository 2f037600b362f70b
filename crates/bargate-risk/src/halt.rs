//! HaltLatch: total-loss halt that stays set until an operator resets it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Reason the latch was triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    /// Equity fell beyond the total loss limit.
    TotalLoss {
        loss_pct: Decimal,
        threshold_pct: Decimal,
    },
    /// Manual trigger by operator.
    Manual { message: String },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TotalLoss {
                loss_pct,
                threshold_pct,
            } => write!(f, "Total loss {} beyond limit {}", loss_pct, threshold_pct),
            Self::Manual { message } => write!(f, "Manual: {}", message),
        }
    }
}

/// Persisted form of a triggered latch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltRecord {
    pub reason: HaltReason,
    pub triggered_at: DateTime<Utc>,
}

/// Halt latch.
///
/// Once triggered, remains triggered until manually reset. Auto-reset is
/// never performed, including at day boundaries.
#[derive(Default)]
pub struct HaltLatch {
    triggered: AtomicBool,
    record: RwLock<Option<HaltRecord>>,
}

impl HaltLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a latch from persisted state.
    #[must_use]
    pub fn restored(record: Option<HaltRecord>) -> Self {
        let latch = Self::new();
        if let Some(record) = record {
            warn!(reason = %record.reason, at = %record.triggered_at, "Halt latch restored as triggered");
            latch.triggered.store(true, Ordering::SeqCst);
            *latch.record.write() = Some(record);
        }
        latch
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Trigger the latch. Returns `false` if it was already triggered
    /// (the original reason is kept).
    pub fn trigger(&self, reason: HaltReason, at: DateTime<Utc>) -> bool {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            error!(reason = %reason, %at, "HALT LATCH TRIGGERED");
            *self.record.write() = Some(HaltRecord {
                reason,
                triggered_at: at,
            });
            true
        } else {
            false
        }
    }

    /// Current record, if triggered.
    #[must_use]
    pub fn record(&self) -> Option<HaltRecord> {
        if self.is_triggered() {
            self.record.read().clone()
        } else {
            None
        }
    }

    /// Clear the latch. Operator action only.
    pub fn reset(&self) {
        if self.is_triggered() {
            let previous = self.record.write().take();
            info!(previous = ?previous, "Halt latch manually reset");
            self.triggered.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_latch_keeps_first_reason() {
        let latch = HaltLatch::new();
        assert!(!latch.is_triggered());

        assert!(latch.trigger(
            HaltReason::TotalLoss {
                loss_pct: dec!(-0.1),
                threshold_pct: dec!(-0.09)
            },
            t()
        ));
        assert!(!latch.trigger(
            HaltReason::Manual {
                message: "second".into()
            },
            t()
        ));

        let record = latch.record().unwrap();
        assert!(matches!(record.reason, HaltReason::TotalLoss { .. }));
        assert_eq!(record.triggered_at, t());
    }

    #[test]
    fn test_reset_clears() {
        let latch = HaltLatch::restored(Some(HaltRecord {
            reason: HaltReason::Manual {
                message: "ops".into(),
            },
            triggered_at: t(),
        }));
        assert!(latch.is_triggered());

        latch.reset();
        assert!(!latch.is_triggered());
        assert!(latch.record().is_none());
    }
}
