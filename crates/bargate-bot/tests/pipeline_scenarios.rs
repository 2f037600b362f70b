//! End-to-end decision pipeline scenarios.
//!
//! Each test drives `DecisionPipeline` with a mock executor and an
//! in-memory event sink, with all state files in a temp directory.

mod integration;
use integration::common::fixtures::*;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bargate_bot::{DecisionPipeline, SymbolOutcome};
use bargate_core::{
    BrokerRejectCode, CandidateZone, ExitMethod, OnboardingStatus, Price, RejectReason,
};
use bargate_executor::{BoxFuture, ExecutionOutcome, Executor, OrderRequest};
use bargate_telemetry::{DecisionEvent, MemoryEventSink};
use rust_decimal_macros::dec;
use tempfile::TempDir;

/// Accepts every order, noting whether the open-risk ledger on disk already
/// held the order's decision when it arrived.
struct LedgerCheckingExecutor {
    ledger_path: PathBuf,
    booked_at_submit: AtomicBool,
}

impl Executor for LedgerCheckingExecutor {
    fn submit(&self, order: OrderRequest) -> BoxFuture<'_, ExecutionOutcome> {
        let body = std::fs::read_to_string(&self.ledger_path).unwrap_or_default();
        self.booked_at_submit
            .store(body.contains(order.decision_id.as_str()), Ordering::SeqCst);
        Box::pin(async {
            ExecutionOutcome::Accepted {
                broker_ref: "checked".to_string(),
            }
        })
    }

    fn name(&self) -> &'static str {
        "ledger-checking"
    }
}

#[tokio::test]
async fn test_promoted_symbol_executes_first_plan_meeting_floor() {
    let dir = TempDir::new().unwrap();
    let h = harness(&config(dir.path()));

    let report = h
        .pipeline
        .process_bar(&signal_bar(at(1, 10), dec!(10000)))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    match &report.outcomes[0].1 {
        SymbolOutcome::Executed {
            decision,
            plan,
            broker_ref,
        } => {
            assert_eq!(broker_ref, "mock");
            assert_eq!(decision.volume.inner(), dec!(0.5));
            assert_eq!(decision.realized_risk, dec!(50));
            // FVG at RR 1.8 is skipped
            assert_eq!(plan.method, ExitMethod::AtrFallback);
            assert!(!plan.clamped);
            assert_eq!(plan.rr, dec!(2.2));
            assert_eq!(plan.sl_final.inner(), dec!(1.0990));
            assert_eq!(plan.tp_final.inner(), dec!(1.1022));
        }
        other => panic!("expected execution, got {other:?}"),
    }

    assert_eq!(h.executor.submission_count(), 1);
    let order = &h.executor.submissions()[0];
    assert_eq!(order.decision_id, decision_id(at(1, 10)));
    assert_eq!(order.volume.inner(), dec!(0.5));

    assert_eq!(h.sink.count("execution_sized"), 1);
    assert_eq!(h.sink.count("exit_planned"), 1);
    assert_eq!(h.sink.count("order_submitted"), 1);

    let state = h.pipeline.onboarding().get_state(&eurusd());
    assert_eq!(state.trades_seen, 1);
    assert_eq!(state.sessions_seen, 1);
    assert_eq!(state.validation_errors, 0);
    assert_eq!(h.pipeline.sizer().open_risk(&eurusd()), dec!(50));
}

#[tokio::test]
async fn test_observe_only_symbol_is_sized_and_planned_but_not_sent() {
    let dir = TempDir::new().unwrap();
    let h = harness(&observe_only_config(dir.path()));

    let report = h
        .pipeline
        .process_bar(&signal_bar(at(1, 10), dec!(10000)))
        .await
        .unwrap();

    match &report.outcomes[0].1 {
        SymbolOutcome::ObserveOnly { decision, plan } => {
            assert_eq!(decision.volume.inner(), dec!(0.5));
            assert_eq!(plan.method, ExitMethod::AtrFallback);
            assert_eq!(plan.rr, dec!(2.2));
        }
        other => panic!("expected observe-only, got {other:?}"),
    }
    assert_eq!(h.executor.submission_count(), 0);
    assert_eq!(h.sink.count("execution_sized"), 1);
    assert_eq!(h.sink.count("exit_planned"), 1);

    let gate_events: Vec<_> = h
        .sink
        .events()
        .into_iter()
        .filter(|e| e.name() == "symbol_onboarding_state")
        .collect();
    assert_eq!(gate_events.len(), 1);
    match &gate_events[0] {
        DecisionEvent::SymbolOnboardingState {
            state,
            execute,
            reason,
            ..
        } => {
            assert_eq!(*state, OnboardingStatus::ObserveOnly);
            assert!(!execute);
            assert_eq!(reason, "observe_only");
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Counters still move; no open risk is booked
    let state = h.pipeline.onboarding().get_state(&eurusd());
    assert_eq!(state.trades_seen, 1);
    assert_eq!(h.pipeline.sizer().open_risk(&eurusd()), dec!(0));
}

#[tokio::test]
async fn test_persisted_state_overrides_config_initial_state() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("onboarding.json"),
        r#"{"EURUSD":{"state":"promoted","trades_seen":7}}"#,
    )
    .unwrap();
    let h = harness(&observe_only_config(dir.path()));

    let report = h
        .pipeline
        .process_bar(&signal_bar(at(1, 10), dec!(10000)))
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0].1,
        SymbolOutcome::Executed { .. }
    ));
    assert_eq!(h.pipeline.onboarding().get_state(&eurusd()).trades_seen, 8);
}

#[tokio::test]
async fn test_daily_hard_stop_blocks_until_next_trading_day() {
    let dir = TempDir::new().unwrap();
    let h = harness(&config(dir.path()));

    let first = h
        .pipeline
        .process_bar(&signal_bar(at(1, 10), dec!(10000)))
        .await
        .unwrap();
    assert!(matches!(first.outcomes[0].1, SymbolOutcome::Executed { .. }));

    // -5% intraday breaches the 4.5% hard stop
    let halted = h
        .pipeline
        .process_bar(&signal_bar(at(1, 11), dec!(9500)))
        .await
        .unwrap();
    assert_eq!(halted.drawdown.veto, Some(RejectReason::DailyDrawdownHalt));
    assert_eq!(
        halted.outcomes[0].1,
        SymbolOutcome::Rejected(RejectReason::DailyDrawdownHalt)
    );
    assert_eq!(h.sink.count("drawdown_halt"), 1);
    assert_eq!(h.executor.submission_count(), 1);

    // A halted bar does not count toward onboarding
    let state = h.pipeline.onboarding().get_state(&eurusd());
    assert_eq!(state.trades_seen, 1);
    assert_eq!(state.sessions_seen, 1);

    // Next day: the first position closes and a new entry is allowed
    let mut next_day = signal_bar(at(2, 10), dec!(9500));
    next_day.closed.push(decision_id(at(1, 10)));
    let resumed = h.pipeline.process_bar(&next_day).await.unwrap();

    assert!(resumed.drawdown.day_rolled);
    assert_eq!(resumed.drawdown.veto, None);
    assert_eq!(resumed.released, vec![(decision_id(at(1, 10)), dec!(50))]);
    match &resumed.outcomes[0].1 {
        SymbolOutcome::Executed { decision, .. } => {
            // 9500 * 0.5% = 47.5, floored to 0.47 lots
            assert_eq!(decision.volume.inner(), dec!(0.47));
            assert_eq!(decision.realized_risk, dec!(47));
        }
        other => panic!("expected execution, got {other:?}"),
    }
    assert_eq!(h.pipeline.sizer().open_risk(&eurusd()), dec!(47));
    assert_eq!(h.pipeline.onboarding().get_state(&eurusd()).trades_seen, 2);
}

#[tokio::test]
async fn test_broker_reject_counts_validation_error_and_books_no_risk() {
    let dir = TempDir::new().unwrap();
    let h = harness(&config(dir.path()));
    h.executor.set_next_outcome(ExecutionOutcome::Rejected {
        code: BrokerRejectCode::InvalidStops,
    });

    let report = h
        .pipeline
        .process_bar(&signal_bar(at(1, 10), dec!(10000)))
        .await
        .unwrap();

    match &report.outcomes[0].1 {
        SymbolOutcome::BrokerRejected { code, .. } => {
            assert_eq!(*code, BrokerRejectCode::InvalidStops)
        }
        other => panic!("expected broker rejection, got {other:?}"),
    }
    assert_eq!(h.sink.count("order_rejected"), 1);
    assert_eq!(h.pipeline.sizer().open_risk(&eurusd()), dec!(0));

    let state = h.pipeline.onboarding().get_state(&eurusd());
    assert_eq!(state.trades_seen, 1);
    assert_eq!(state.validation_errors, 1);
}

#[tokio::test]
async fn test_retried_bar_is_not_resubmitted() {
    let dir = TempDir::new().unwrap();
    let h = harness(&config(dir.path()));
    let bar = signal_bar(at(1, 10), dec!(10000));

    h.pipeline.process_bar(&bar).await.unwrap();
    let retry = h.pipeline.process_bar(&bar).await.unwrap();

    assert_eq!(
        retry.outcomes[0].1,
        SymbolOutcome::AlreadyExecuted(decision_id(at(1, 10)))
    );
    assert_eq!(h.executor.submission_count(), 1);
    assert_eq!(h.sink.count("execution_sized"), 1);
    assert_eq!(h.pipeline.sizer().open_risk(&eurusd()), dec!(50));
    assert_eq!(h.pipeline.onboarding().get_state(&eurusd()).trades_seen, 1);
}

#[tokio::test]
async fn test_retried_observe_only_bar_counts_once() {
    let dir = TempDir::new().unwrap();
    let h = harness(&observe_only_config(dir.path()));
    let bar = signal_bar(at(1, 10), dec!(10000));

    h.pipeline.process_bar(&bar).await.unwrap();
    let retry = h.pipeline.process_bar(&bar).await.unwrap();

    assert!(matches!(
        retry.outcomes[0].1,
        SymbolOutcome::ObserveOnly { .. }
    ));
    let state = h.pipeline.onboarding().get_state(&eurusd());
    assert_eq!(state.trades_seen, 1);
    assert_eq!(state.sessions_seen, 1);
    assert_eq!(h.sink.count("execution_sized"), 1);
    assert_eq!(h.executor.submission_count(), 0);

    // The same symbol on the next bar is a new decision
    h.pipeline
        .process_bar(&signal_bar(at(1, 11), dec!(10000)))
        .await
        .unwrap();
    assert_eq!(h.pipeline.onboarding().get_state(&eurusd()).trades_seen, 2);
}

#[tokio::test]
async fn test_sized_event_reports_volume_refit_to_planned_stop() {
    let dir = TempDir::new().unwrap();
    let h = harness(&config(dir.path()));
    let mut bar = signal_bar(at(1, 10), dec!(10000));
    // 15 pip order-block stop against the signal's 10 pip stop
    bar.symbols[0].zones = vec![CandidateZone::new(
        ExitMethod::OrderBlock,
        Price::new(dec!(1.0985)),
        Price::new(dec!(1.1040)),
    )];

    let report = h.pipeline.process_bar(&bar).await.unwrap();
    assert!(matches!(
        report.outcomes[0].1,
        SymbolOutcome::Executed { .. }
    ));

    let order = &h.executor.submissions()[0];
    assert_eq!(order.volume.inner(), dec!(0.33));

    let sized: Vec<_> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            DecisionEvent::ExecutionSized {
                volume,
                stop_distance,
                ..
            } => Some((volume, stop_distance)),
            _ => None,
        })
        .collect();
    assert_eq!(sized, vec![(order.volume, dec!(0.0015))]);
}

#[tokio::test]
async fn test_open_risk_is_booked_before_submit() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let sink = Arc::new(MemoryEventSink::new());
    let executor = Arc::new(LedgerCheckingExecutor {
        ledger_path: config.risk.ledger_path.clone(),
        booked_at_submit: AtomicBool::new(false),
    });
    let pipeline = DecisionPipeline::open(&config, sink.clone(), executor.clone()).unwrap();

    let report = pipeline
        .process_bar(&signal_bar(at(1, 10), dec!(10000)))
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0].1,
        SymbolOutcome::Executed { .. }
    ));
    assert!(executor.booked_at_submit.load(Ordering::SeqCst));
    assert_eq!(pipeline.sizer().open_risk(&eurusd()), dec!(50));
    assert_eq!(sink.count("order_submitted"), 1);
}

#[tokio::test]
async fn test_no_exit_meeting_floor_rejects_without_counting() {
    let dir = TempDir::new().unwrap();
    let h = harness(&config(dir.path()));
    let mut bar = signal_bar(at(1, 10), dec!(10000));
    // Only the RR 1.8 FVG; no ATR on the signal, no strategy target
    bar.symbols[0].zones.truncate(1);

    let report = h.pipeline.process_bar(&bar).await.unwrap();

    assert_eq!(
        report.outcomes[0].1,
        SymbolOutcome::Rejected(RejectReason::NoValidExit)
    );
    assert_eq!(h.sink.count("execution_sized"), 1);
    assert_eq!(h.sink.count("no_valid_exit"), 1);
    assert_eq!(h.executor.submission_count(), 0);
    assert_eq!(h.pipeline.onboarding().get_state(&eurusd()).trades_seen, 0);
}

#[tokio::test]
async fn test_signal_for_other_bar_is_rejected() {
    let dir = TempDir::new().unwrap();
    let h = harness(&config(dir.path()));
    let mut bar = signal_bar(at(1, 10), dec!(10000));
    bar.symbols[0].signal = Some(buy_signal(at(1, 9)));

    let report = h.pipeline.process_bar(&bar).await.unwrap();

    assert_eq!(
        report.outcomes[0].1,
        SymbolOutcome::Rejected(RejectReason::InvalidSignal)
    );
    assert_eq!(h.executor.submission_count(), 0);
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let bars = {
        let mut third = signal_bar(at(1, 12), dec!(9950));
        third.closed.push(decision_id(at(1, 10)));
        vec![
            signal_bar(at(1, 10), dec!(10000)),
            quiet_bar(at(1, 11), dec!(9900)),
            third,
            signal_bar(at(2, 10), dec!(9980)),
        ]
    };

    let run = |dir: &std::path::Path| {
        let h = harness(&config(dir));
        let bars = bars.clone();
        async move {
            let mut outcomes = Vec::new();
            for bar in &bars {
                outcomes.push(h.pipeline.process_bar(bar).await.unwrap().outcomes);
            }
            (outcomes, normalized(h.sink.events()))
        }
    };

    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let (outcomes_a, events_a) = run(a.path()).await;
    let (outcomes_b, events_b) = run(b.path()).await;

    assert_eq!(outcomes_a, outcomes_b);
    assert_eq!(events_a, events_b);
    for file in ["onboarding.json", "open_risk.json", "drawdown.json"] {
        let left = std::fs::read_to_string(a.path().join(file)).unwrap();
        let right = std::fs::read_to_string(b.path().join(file)).unwrap();
        assert_eq!(left, right, "{file} differs between replays");
    }
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let h = harness(&config(dir.path()));
        h.pipeline
            .process_bar(&signal_bar(at(1, 10), dec!(10000)))
            .await
            .unwrap();
    }

    let h = harness(&config(dir.path()));
    assert_eq!(h.pipeline.sizer().open_risk(&eurusd()), dec!(50));
    assert_eq!(h.pipeline.onboarding().get_state(&eurusd()).trades_seen, 1);

    // Replaying the executed bar after a restart still does not resubmit
    let report = h
        .pipeline
        .process_bar(&signal_bar(at(1, 10), dec!(10000)))
        .await
        .unwrap();
    assert!(matches!(
        report.outcomes[0].1,
        SymbolOutcome::AlreadyExecuted(_)
    ));
    assert_eq!(h.executor.submission_count(), 0);
}
