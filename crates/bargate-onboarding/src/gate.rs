//! OnboardingGate: per-symbol promotion state with atomic persistence.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use bargate_core::{DecisionId, OnboardingStatus, Symbol};
use bargate_persistence::StateFile;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::OnboardingConfig;
use crate::error::OnboardingResult;
use crate::policy::{ManualPromotion, ProbationPolicy, PromotionPolicy, SymbolRiskConfig};
use crate::state::{merge_state, SymbolOnboardingRecord, SymbolOnboardingState};

type RecordMap = BTreeMap<Symbol, SymbolOnboardingRecord>;

/// Onboarding gate.
///
/// The persisted record map is the only mutable state. It is guarded by one
/// mutex and every mutation rewrites the whole file before the in-memory map
/// is updated, so memory and disk never diverge.
pub struct OnboardingGate {
    config: OnboardingConfig,
    store: StateFile,
    records: Mutex<RecordMap>,
    /// Decisions already counted today; cleared by [`Self::roll_day`].
    recorded: Mutex<HashSet<DecisionId>>,
    probation: Box<dyn ProbationPolicy>,
    promotion: Box<dyn PromotionPolicy>,
}

impl OnboardingGate {
    /// Open the gate, loading persisted state.
    ///
    /// A missing state file is an empty map. An unreadable or unparsable file
    /// is an error: the whole symbol universe cannot be safely defaulted.
    /// Records holding out-of-range probation values are rejected the same
    /// way a bad config overlay is.
    pub fn open(config: OnboardingConfig) -> OnboardingResult<Self> {
        config.validate()?;
        let store = StateFile::new(config.state_path.clone());
        let records: RecordMap = store.load()?.unwrap_or_default();
        for (symbol, record) in &records {
            record.validate(symbol)?;
        }

        info!(
            path = %store.path().display(),
            symbols = records.len(),
            probation_policy = ?config.probation_policy,
            "Onboarding state loaded"
        );

        let probation = config.probation_policy.build();
        Ok(Self {
            config,
            store,
            records: Mutex::new(records),
            recorded: Mutex::new(HashSet::new()),
            probation,
            promotion: Box::new(ManualPromotion),
        })
    }

    /// Replace the promotion policy.
    #[must_use]
    pub fn with_promotion_policy(mut self, policy: Box<dyn PromotionPolicy>) -> Self {
        self.promotion = policy;
        self
    }

    /// Merged state for a symbol. Never fails; unknown symbols get defaults.
    pub fn get_state(&self, symbol: &Symbol) -> SymbolOnboardingState {
        let records = self.records.lock();
        self.resolve(&records, symbol)
    }

    /// `true` iff the symbol is promoted and allowed to execute when promoted.
    pub fn should_execute(&self, symbol: &Symbol) -> bool {
        self.get_state(symbol).should_execute()
    }

    /// Add this bar's counts to the symbol's counters and persist all symbols.
    ///
    /// Does not change `state`; see [`Self::evaluate_promotion`].
    pub fn record_outcome(
        &self,
        symbol: &Symbol,
        decision_count: u64,
        session_present: bool,
        validation_error_count: u64,
    ) -> OnboardingResult<SymbolOnboardingState> {
        let state = self.mutate(symbol, |s| {
            if session_present {
                s.sessions_seen = s.sessions_seen.saturating_add(1);
            }
            s.trades_seen = s.trades_seen.saturating_add(decision_count);
            s.validation_errors = s.validation_errors.saturating_add(validation_error_count);
        })?;
        debug!(
            %symbol,
            sessions_seen = state.sessions_seen,
            trades_seen = state.trades_seen,
            validation_errors = state.validation_errors,
            "Onboarding outcome recorded"
        );
        Ok(state)
    }

    /// Count one decision against its symbol, at most once per decision id.
    ///
    /// Returns `None` without touching the counters if this id was already
    /// recorded since the last [`Self::roll_day`].
    pub fn record_decision(
        &self,
        decision_id: &DecisionId,
        symbol: &Symbol,
        session_present: bool,
        validation_error_count: u64,
    ) -> OnboardingResult<Option<SymbolOnboardingState>> {
        let mut recorded = self.recorded.lock();
        if recorded.contains(decision_id) {
            debug!(%decision_id, "Decision already counted; onboarding counters unchanged");
            return Ok(None);
        }
        let state = self.record_outcome(symbol, 1, session_present, validation_error_count)?;
        recorded.insert(decision_id.clone());
        Ok(Some(state))
    }

    /// Forget the decisions counted on the previous trading day.
    pub fn roll_day(&self) {
        self.recorded.lock().clear();
    }

    /// Probation-adjusted risk settings. Pure; `risk` is never modified.
    pub fn apply_probation_overrides(
        &self,
        symbol: &Symbol,
        risk: &SymbolRiskConfig,
    ) -> SymbolRiskConfig {
        let state = self.get_state(symbol);
        self.probation.apply(&state, risk)
    }

    /// Run the promotion policy and persist any transition it returns.
    pub fn evaluate_promotion(
        &self,
        symbol: &Symbol,
        at: DateTime<Utc>,
    ) -> OnboardingResult<Option<OnboardingStatus>> {
        let state = self.get_state(symbol);
        let Some(next) = self.promotion.evaluate(&state) else {
            return Ok(None);
        };
        if next == state.state {
            return Ok(None);
        }
        info!(
            %symbol,
            from = %state.state,
            to = %next,
            policy = self.promotion.version(),
            "Promotion policy transition"
        );
        match next {
            OnboardingStatus::Promoted => self.promote(symbol, at)?,
            OnboardingStatus::ObserveOnly => self.demote(symbol)?,
        };
        Ok(Some(next))
    }

    /// Operator action: promote a symbol to live trading.
    pub fn promote(
        &self,
        symbol: &Symbol,
        at: DateTime<Utc>,
    ) -> OnboardingResult<SymbolOnboardingState> {
        let state = self.mutate(symbol, |s| {
            s.state = OnboardingStatus::Promoted;
            s.last_promotion_timestamp = Some(at);
        })?;
        info!(%symbol, %at, "Symbol promoted");
        Ok(state)
    }

    /// Operator action: return a symbol to observe-only.
    pub fn demote(&self, symbol: &Symbol) -> OnboardingResult<SymbolOnboardingState> {
        let state = self.mutate(symbol, |s| {
            s.state = OnboardingStatus::ObserveOnly;
        })?;
        warn!(%symbol, "Symbol demoted to observe-only");
        Ok(state)
    }

    /// Merged state of every symbol known to config or persisted state.
    pub fn snapshot(&self) -> Vec<SymbolOnboardingState> {
        let records = self.records.lock();
        let symbols: BTreeSet<Symbol> = records
            .keys()
            .cloned()
            .chain(self.config.symbols.keys().map(|s| Symbol::from(s.as_str())))
            .collect();
        symbols
            .iter()
            .map(|s| self.resolve(&records, s))
            .collect()
    }

    pub fn probation_policy_version(&self) -> &'static str {
        self.probation.version()
    }

    fn resolve(&self, records: &RecordMap, symbol: &Symbol) -> SymbolOnboardingState {
        merge_state(
            symbol,
            self.config.symbols.get(symbol.as_str()),
            records.get(symbol),
        )
    }

    /// Apply `f` to the merged state, persist the full map, then commit.
    fn mutate<F>(&self, symbol: &Symbol, f: F) -> OnboardingResult<SymbolOnboardingState>
    where
        F: FnOnce(&mut SymbolOnboardingState),
    {
        let mut records = self.records.lock();
        let mut state = self.resolve(&records, symbol);
        f(&mut state);

        let mut next = records.clone();
        next.insert(symbol.clone(), state.to_record());
        self.store.save(&next)?;
        *records = next;

        Ok(state)
    }
}
