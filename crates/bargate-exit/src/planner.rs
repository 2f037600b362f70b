//! ExitPlanner: fixed-priority stop/target cascade with an RR floor.
//!
//! Methods are tried in `ExitMethod::CASCADE` order and, within a method, in
//! the order the detector supplied them. Priority is policy: an earlier
//! method that meets the floor always beats a later one with better RR.

use std::sync::Arc;

use bargate_core::{
    CandidateZone, DecisionId, Direction, ExitMethod, ExitPlan, Price, RejectReason, Signal,
    SizedDecision, SymbolSpec,
};
use bargate_telemetry::{DecisionEvent, EventSink};
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::config::ExitConfig;
use crate::error::ExitResult;

/// No cascade method produced an acceptable plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRejection {
    pub decision_id: DecisionId,
    pub reason: RejectReason,
    pub rr_floor: Decimal,
    pub candidates_considered: usize,
}

/// Exit planner.
pub struct ExitPlanner {
    config: ExitConfig,
    sink: Arc<dyn EventSink>,
}

impl ExitPlanner {
    pub fn new(config: ExitConfig, sink: Arc<dyn EventSink>) -> ExitResult<Self> {
        config.validate()?;
        Ok(Self { config, sink })
    }

    pub fn config(&self) -> &ExitConfig {
        &self.config
    }

    /// Default RR floor, before any probation override.
    pub fn default_rr_floor(&self) -> Decimal {
        self.config.default_rr_floor
    }

    /// Select stop/target levels for a sized decision.
    ///
    /// Emits `exit_planned` on success and `no_valid_exit` otherwise.
    pub fn plan(
        &self,
        decision: &SizedDecision,
        signal: &Signal,
        zones: &[CandidateZone],
        spec: &SymbolSpec,
        rr_floor: Decimal,
    ) -> Result<ExitPlan, PlanRejection> {
        let entry = decision.entry_price;
        let direction = decision.direction;
        let candidates = self.candidates(entry, direction, signal, zones, rr_floor);
        let atr_synthesized = !zones.iter().any(|z| z.method == ExitMethod::AtrFallback);
        let mut considered = 0usize;

        for zone in &candidates {
            considered += 1;
            let target_tracks_floor = atr_synthesized && zone.method == ExitMethod::AtrFallback;
            let Some(plan) =
                Self::evaluate(entry, direction, zone, spec, rr_floor, target_tracks_floor)
            else {
                debug!(
                    decision_id = %decision.decision_id,
                    method = %zone.method,
                    stop_loss = %zone.stop_loss,
                    take_profit = %zone.take_profit,
                    "Candidate on wrong side of entry; skipped"
                );
                continue;
            };

            if plan.rr >= rr_floor {
                self.sink.emit(&DecisionEvent::exit_planned(decision, &plan));
                return Ok(plan);
            }
            trace!(
                decision_id = %decision.decision_id,
                method = %plan.method,
                rr = %plan.rr,
                %rr_floor,
                "Candidate below RR floor"
            );
        }

        self.sink.emit(&DecisionEvent::NoValidExit {
            decision_id: decision.decision_id.clone(),
            symbol: decision.symbol.clone(),
            bar_time: decision.bar_time,
            rr_floor,
            candidates_considered: considered,
        });
        Err(PlanRejection {
            decision_id: decision.decision_id.clone(),
            reason: RejectReason::NoValidExit,
            rr_floor,
            candidates_considered: considered,
        })
    }

    /// Candidates in cascade order. ATR and legacy levels are synthesized
    /// from the signal when the detector supplied none.
    fn candidates(
        &self,
        entry: Price,
        direction: Direction,
        signal: &Signal,
        zones: &[CandidateZone],
        rr_floor: Decimal,
    ) -> Vec<CandidateZone> {
        let mut out = Vec::with_capacity(zones.len() + 2);
        for method in ExitMethod::CASCADE {
            let before = out.len();
            out.extend(zones.iter().filter(|z| z.method == method).cloned());
            if out.len() > before {
                continue;
            }
            let synthesized = match method {
                ExitMethod::AtrFallback => self.atr_zone(entry, direction, signal, rr_floor),
                ExitMethod::Legacy => Self::legacy_zone(entry, direction, signal),
                _ => None,
            };
            out.extend(synthesized);
        }
        out
    }

    /// `k × ATR` stop; target extended to `stop × rr_floor` when short.
    fn atr_zone(
        &self,
        entry: Price,
        direction: Direction,
        signal: &Signal,
        rr_floor: Decimal,
    ) -> Option<CandidateZone> {
        let atr = signal.atr.filter(|a| *a > Decimal::ZERO)?;
        let sl = atr * self.config.atr_sl_multiplier;
        let tp = (atr * self.config.atr_tp_multiplier).max(sl * rr_floor);
        Some(CandidateZone::new(
            ExitMethod::AtrFallback,
            direction.stop_price(entry, sl),
            direction.target_price(entry, tp),
        ))
    }

    fn legacy_zone(entry: Price, direction: Direction, signal: &Signal) -> Option<CandidateZone> {
        let tp = signal.take_profit_distance?;
        Some(CandidateZone::new(
            ExitMethod::Legacy,
            direction.stop_price(entry, signal.stop_distance),
            direction.target_price(entry, tp),
        ))
    }

    /// Apply the broker minimum distance and tick rounding to one candidate.
    /// Returns `None` if either level sits on the wrong side of entry.
    ///
    /// With `target_tracks_floor` the target is re-derived from the rounded
    /// stop so rounding cannot pull it under `rr_floor`.
    fn evaluate(
        entry: Price,
        direction: Direction,
        zone: &CandidateZone,
        spec: &SymbolSpec,
        rr_floor: Decimal,
        target_tracks_floor: bool,
    ) -> Option<ExitPlan> {
        let sl_requested_dist = direction.stop_distance(entry, zone.stop_loss)?;
        let tp_requested_dist = direction.target_distance(entry, zone.take_profit)?;
        let min = spec.min_stop_distance;

        let mut sl_dist = sl_requested_dist;
        let mut tp_dist = tp_requested_dist;
        let mut clamped = false;
        if sl_dist < min {
            let scale = min / sl_dist;
            sl_dist = min;
            tp_dist *= scale;
            clamped = true;
        }
        if tp_dist < min {
            tp_dist = min;
            clamped = true;
        }

        let mut sl_final = direction.stop_price(entry, sl_dist);
        let mut tp_final = direction.target_price(entry, tp_dist);
        if let Some(tick) = spec.tick_size.filter(|t| *t > Decimal::ZERO) {
            sl_final = round_from_entry(entry, sl_final, tick, true);
            let toward = round_from_entry(entry, tp_final, tick, false);
            tp_final = match direction.target_distance(entry, toward) {
                Some(d) if d >= min => toward,
                _ => round_from_entry(entry, tp_final, tick, true),
            };
        }

        let sl_final_dist = direction.stop_distance(entry, sl_final)?;
        let mut tp_final_dist = direction.target_distance(entry, tp_final)?;
        if target_tracks_floor && tp_final_dist < sl_final_dist * rr_floor {
            tp_final = direction.target_price(entry, sl_final_dist * rr_floor);
            if let Some(tick) = spec.tick_size.filter(|t| *t > Decimal::ZERO) {
                tp_final = round_from_entry(entry, tp_final, tick, true);
            }
            tp_final_dist = direction.target_distance(entry, tp_final)?;
        }

        Some(ExitPlan {
            method: zone.method,
            entry,
            sl_requested: zone.stop_loss,
            sl_final,
            tp_requested: zone.take_profit,
            tp_final,
            clamped,
            rr: tp_final_dist / sl_final_dist,
            rr_floor,
        })
    }
}

/// Round `level` to `tick`, away from or toward `entry`.
fn round_from_entry(entry: Price, level: Price, tick: Decimal, away: bool) -> Price {
    if (level < entry) == away {
        level.floor_to_tick(tick)
    } else {
        level.ceil_to_tick(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bargate_core::{Symbol, Volume};
    use bargate_telemetry::MemoryEventSink;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn spec() -> SymbolSpec {
        SymbolSpec {
            value_per_unit: dec!(100000),
            volume_step: dec!(0.01),
            min_volume: dec!(0.01),
            max_volume: None,
            min_stop_distance: dec!(0.0005),
            tick_size: Some(dec!(0.00001)),
        }
    }

    fn signal(direction: Direction, atr: Option<Decimal>) -> Signal {
        Signal {
            symbol: Symbol::from("EURUSD"),
            direction,
            bar_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            entry_price: Price::new(dec!(1.1000)),
            stop_distance: dec!(0.0010),
            take_profit_distance: None,
            atr,
        }
    }

    fn decision(signal: &Signal) -> SizedDecision {
        SizedDecision {
            decision_id: signal.decision_id(),
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            bar_time: signal.bar_time,
            entry_price: signal.entry_price,
            stop_distance: signal.stop_distance,
            volume: Volume::new(dec!(0.5)),
            risk_amount: dec!(50),
            realized_risk: dec!(50),
            open_risk_budget_remaining: dec!(50),
        }
    }

    fn zone(method: ExitMethod, sl: Decimal, tp: Decimal) -> CandidateZone {
        CandidateZone::new(method, Price::new(sl), Price::new(tp))
    }

    fn planner() -> (ExitPlanner, Arc<MemoryEventSink>) {
        let sink = Arc::new(MemoryEventSink::new());
        let p = ExitPlanner::new(ExitConfig::default(), sink.clone()).unwrap();
        (p, sink)
    }

    #[test]
    fn test_earlier_method_wins_when_both_pass() {
        let (p, sink) = planner();
        let sig = signal(Direction::Buy, None);
        let zones = [
            zone(ExitMethod::AtrFallback, dec!(1.0990), dec!(1.1040)),
            zone(ExitMethod::OrderBlock, dec!(1.0990), dec!(1.1025)),
        ];

        let plan = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2))
            .unwrap();
        assert_eq!(plan.method, ExitMethod::OrderBlock);
        assert_eq!(plan.rr, dec!(2.5));
        assert!(!plan.clamped);
        assert_eq!(sink.count("exit_planned"), 1);
    }

    #[test]
    fn test_falls_through_below_floor() {
        let (p, _sink) = planner();
        let sig = signal(Direction::Buy, None);
        let zones = [
            zone(ExitMethod::FairValueGap, dec!(1.0990), dec!(1.1018)),
            zone(ExitMethod::AtrFallback, dec!(1.0990), dec!(1.1022)),
        ];

        let plan = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2.0))
            .unwrap();
        assert_eq!(plan.method, ExitMethod::AtrFallback);
        assert_eq!(plan.rr, dec!(2.2));
        assert!(!plan.clamped);
    }

    #[test]
    fn test_clamp_widens_proportionally_and_keeps_requested() {
        let (p, sink) = planner();
        let sig = signal(Direction::Buy, None);
        let zones = [zone(ExitMethod::OrderBlock, dec!(1.0998), dec!(1.1006))];

        let plan = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2))
            .unwrap();
        assert!(plan.clamped);
        assert_eq!(plan.sl_requested.inner(), dec!(1.0998));
        assert_eq!(plan.tp_requested.inner(), dec!(1.1006));
        assert_eq!(plan.sl_final.inner(), dec!(1.0995));
        assert_eq!(plan.tp_final.inner(), dec!(1.1015));
        assert!(plan.final_stop_distance() >= dec!(0.0005));
        assert_eq!(plan.rr, dec!(3));

        match &sink.events()[0] {
            DecisionEvent::ExitPlanned { clamped, rr, .. } => {
                assert!(*clamped);
                assert_eq!(*rr, dec!(3));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_wrong_side_candidate_skipped() {
        let (p, _sink) = planner();
        let sig = signal(Direction::Buy, None);
        let zones = [
            // stop above entry for a buy
            zone(ExitMethod::OrderBlock, dec!(1.1010), dec!(1.1050)),
            zone(ExitMethod::UntestedZone, dec!(1.0990), dec!(1.1030)),
        ];

        let plan = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2))
            .unwrap();
        assert_eq!(plan.method, ExitMethod::UntestedZone);
    }

    #[test]
    fn test_within_method_input_order() {
        let (p, _sink) = planner();
        let sig = signal(Direction::Buy, None);
        let zones = [
            zone(ExitMethod::FairValueGap, dec!(1.0990), dec!(1.1015)),
            zone(ExitMethod::FairValueGap, dec!(1.0990), dec!(1.1021)),
            zone(ExitMethod::FairValueGap, dec!(1.0990), dec!(1.1050)),
        ];

        let plan = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2))
            .unwrap();
        assert_eq!(plan.tp_final.inner(), dec!(1.1021));
    }

    #[test]
    fn test_atr_synthesized_and_extended_to_floor() {
        let (p, _sink) = planner();
        let sig = signal(Direction::Sell, Some(dec!(0.0010)));

        // sl 1.5 × ATR = 0.0015; tp 3 × ATR = 0.0030 < 0.0015 × 2.5
        let plan = p
            .plan(&decision(&sig), &sig, &[], &spec(), dec!(2.5))
            .unwrap();
        assert_eq!(plan.method, ExitMethod::AtrFallback);
        assert_eq!(plan.sl_final.inner(), dec!(1.1015));
        assert_eq!(plan.tp_final.inner(), dec!(1.09625));
        assert_eq!(plan.rr, dec!(2.5));
    }

    #[test]
    fn test_atr_target_follows_rounded_stop_off_tick_entry() {
        let (p, sink) = planner();
        let mut sig = signal(Direction::Buy, Some(dec!(0.0010)));
        sig.entry_price = Price::new(dec!(1.100005));

        // Stop widens to 1.09850 on rounding, so the target must reach
        // 0.001505 × 2.5 past entry and round outward to 1.10377
        let plan = p
            .plan(&decision(&sig), &sig, &[], &spec(), dec!(2.5))
            .unwrap();
        assert_eq!(plan.method, ExitMethod::AtrFallback);
        assert_eq!(plan.sl_final.inner(), dec!(1.09850));
        assert_eq!(plan.tp_final.inner(), dec!(1.10377));
        assert!(plan.rr >= dec!(2.5));
        assert_eq!(sink.count("no_valid_exit"), 0);
    }

    #[test]
    fn test_supplied_atr_zone_replaces_synthesized() {
        let (p, _sink) = planner();
        let sig = signal(Direction::Buy, Some(dec!(0.0010)));
        let zones = [zone(ExitMethod::AtrFallback, dec!(1.0990), dec!(1.1015))];

        // supplied zone is 1.5R; the synthesized one would have passed
        let err = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2))
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::NoValidExit);
        assert_eq!(err.candidates_considered, 1);
    }

    #[test]
    fn test_legacy_from_signal_target() {
        let (p, _sink) = planner();
        let mut sig = signal(Direction::Buy, None);
        sig.take_profit_distance = Some(dec!(0.0030));

        let plan = p.plan(&decision(&sig), &sig, &[], &spec(), dec!(2)).unwrap();
        assert_eq!(plan.method, ExitMethod::Legacy);
        assert_eq!(plan.sl_final.inner(), dec!(1.0990));
        assert_eq!(plan.rr, dec!(3));
    }

    #[test]
    fn test_no_valid_exit_emits_event() {
        let (p, sink) = planner();
        let sig = signal(Direction::Buy, None);
        let zones = [zone(ExitMethod::FairValueGap, dec!(1.0990), dec!(1.1018))];

        let err = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2))
            .unwrap_err();
        assert_eq!(err.reason, RejectReason::NoValidExit);
        assert_eq!(sink.count("no_valid_exit"), 1);
        assert_eq!(sink.count("exit_planned"), 0);
    }

    #[test]
    fn test_tick_rounding_direction() {
        let (p, _sink) = planner();
        let sig = signal(Direction::Sell, None);
        let zones = [zone(
            ExitMethod::OrderBlock,
            dec!(1.100623),
            dec!(1.097777),
        )];

        let plan = p
            .plan(&decision(&sig), &sig, &zones, &spec(), dec!(2))
            .unwrap();
        // stop rounded away from entry, target toward it
        assert_eq!(plan.sl_final.inner(), dec!(1.10063));
        assert_eq!(plan.tp_final.inner(), dec!(1.09778));
        assert!(!plan.clamped);
    }
}
