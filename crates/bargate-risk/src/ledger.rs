//! OpenRiskLedger: realized risk of executed, unclosed decisions per symbol.

use std::collections::BTreeMap;

use bargate_core::{DecisionId, Symbol};
use bargate_persistence::StateFile;
use bargate_telemetry::Metrics;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::RiskResult;

type Entries = BTreeMap<Symbol, BTreeMap<DecisionId, Decimal>>;

/// Persisted open-risk ledger.
///
/// Keyed by decision id, so recording the same decision twice (a retried
/// bar) never double counts.
pub struct OpenRiskLedger {
    store: StateFile,
    entries: Mutex<Entries>,
}

impl OpenRiskLedger {
    /// Open the ledger. A missing file is empty; a corrupt file is an error.
    pub fn open(store: StateFile) -> RiskResult<Self> {
        let entries: Entries = store.load()?.unwrap_or_default();
        for (symbol, by_id) in &entries {
            let total: Decimal = by_id.values().copied().sum();
            Metrics::open_risk(symbol.as_str(), total.to_f64().unwrap_or(0.0));
        }
        Ok(Self {
            store,
            entries: Mutex::new(entries),
        })
    }

    /// Total open risk for a symbol.
    pub fn open_risk(&self, symbol: &Symbol) -> Decimal {
        self.entries
            .lock()
            .get(symbol)
            .map(|by_id| by_id.values().copied().sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// Open risk for a symbol, not counting `decision_id` itself.
    pub fn open_risk_excluding(&self, symbol: &Symbol, decision_id: &DecisionId) -> Decimal {
        self.entries
            .lock()
            .get(symbol)
            .map(|by_id| {
                by_id
                    .iter()
                    .filter(|(id, _)| *id != decision_id)
                    .map(|(_, r)| *r)
                    .sum()
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether a decision is already booked.
    pub fn contains(&self, decision_id: &DecisionId) -> bool {
        let Some(symbol) = decision_id.symbol() else {
            return false;
        };
        self.entries
            .lock()
            .get(&symbol)
            .is_some_and(|by_id| by_id.contains_key(decision_id))
    }

    /// Record an executed decision's risk. Returns `false` if already recorded.
    pub fn record(
        &self,
        symbol: &Symbol,
        decision_id: &DecisionId,
        risk: Decimal,
    ) -> RiskResult<bool> {
        let mut entries = self.entries.lock();
        if entries
            .get(symbol)
            .is_some_and(|by_id| by_id.contains_key(decision_id))
        {
            debug!(%decision_id, "Open risk already recorded");
            return Ok(false);
        }

        let mut next = entries.clone();
        next.entry(symbol.clone())
            .or_default()
            .insert(decision_id.clone(), risk);
        self.store.save(&next)?;
        *entries = next;

        let total: Decimal = entries
            .get(symbol)
            .map(|by_id| by_id.values().copied().sum())
            .unwrap_or(Decimal::ZERO);
        Metrics::open_risk(symbol.as_str(), total.to_f64().unwrap_or(0.0));
        debug!(%symbol, %decision_id, %risk, open_risk = %total, "Open risk recorded");
        Ok(true)
    }

    /// Release a closed position's risk. Returns the released amount.
    pub fn release(&self, decision_id: &DecisionId) -> RiskResult<Option<Decimal>> {
        let Some(symbol) = decision_id.symbol() else {
            warn!(%decision_id, "Malformed decision id; nothing released");
            return Ok(None);
        };

        let mut entries = self.entries.lock();
        let Some(risk) = entries
            .get(&symbol)
            .and_then(|by_id| by_id.get(decision_id))
            .copied()
        else {
            debug!(%decision_id, "No open risk to release");
            return Ok(None);
        };

        let mut next = entries.clone();
        if let Some(by_id) = next.get_mut(&symbol) {
            by_id.remove(decision_id);
            if by_id.is_empty() {
                next.remove(&symbol);
            }
        }
        self.store.save(&next)?;
        *entries = next;

        let total: Decimal = entries
            .get(&symbol)
            .map(|by_id| by_id.values().copied().sum())
            .unwrap_or(Decimal::ZERO);
        Metrics::open_risk(symbol.as_str(), total.to_f64().unwrap_or(0.0));
        debug!(%symbol, %decision_id, %risk, open_risk = %total, "Open risk released");
        Ok(Some(risk))
    }

    /// Open decisions per symbol.
    pub fn snapshot(&self) -> BTreeMap<Symbol, Vec<(DecisionId, Decimal)>> {
        self.entries
            .lock()
            .iter()
            .map(|(s, by_id)| {
                (
                    s.clone(),
                    by_id.iter().map(|(id, r)| (id.clone(), *r)).collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn id(symbol: &Symbol, hour: u32) -> DecisionId {
        DecisionId::new(symbol, Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap())
    }

    #[test]
    fn test_record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let ledger = OpenRiskLedger::open(StateFile::new(dir.path().join("risk.json"))).unwrap();
        let symbol = Symbol::from("EURUSD");

        assert!(ledger.record(&symbol, &id(&symbol, 1), dec!(50)).unwrap());
        assert!(!ledger.record(&symbol, &id(&symbol, 1), dec!(50)).unwrap());
        assert!(ledger.record(&symbol, &id(&symbol, 2), dec!(30)).unwrap());
        assert!(ledger.contains(&id(&symbol, 2)));
        assert!(!ledger.contains(&id(&symbol, 3)));

        assert_eq!(ledger.open_risk(&symbol), dec!(80));
        assert_eq!(ledger.open_risk_excluding(&symbol, &id(&symbol, 1)), dec!(30));
        assert_eq!(ledger.open_risk(&Symbol::from("GBPUSD")), Decimal::ZERO);
    }

    #[test]
    fn test_release_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("risk.json");
        let symbol = Symbol::from("EURUSD");
        {
            let ledger = OpenRiskLedger::open(StateFile::new(&path)).unwrap();
            ledger.record(&symbol, &id(&symbol, 1), dec!(50)).unwrap();
            ledger.record(&symbol, &id(&symbol, 2), dec!(25)).unwrap();
            assert_eq!(ledger.release(&id(&symbol, 1)).unwrap(), Some(dec!(50)));
            assert_eq!(ledger.release(&id(&symbol, 1)).unwrap(), None);
        }

        let ledger = OpenRiskLedger::open(StateFile::new(&path)).unwrap();
        assert_eq!(ledger.open_risk(&symbol), dec!(25));
        assert_eq!(ledger.snapshot()[&symbol].len(), 1);
    }
}
