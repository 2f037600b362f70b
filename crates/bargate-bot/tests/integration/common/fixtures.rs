//! Config, signal and pipeline builders rooted in a temp directory.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use bargate_bot::{AppConfig, BarInput, DecisionPipeline, SymbolBar};
use bargate_core::{
    CandidateZone, DecisionId, Direction, ExitMethod, OnboardingStatus, Price, Signal, Symbol,
    SymbolSpec,
};
use bargate_executor::MockExecutor;
use bargate_onboarding::SymbolOnboardingConfig;
use bargate_telemetry::{DecisionEvent, MemoryEventSink};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn eurusd() -> Symbol {
    Symbol::from("EURUSD")
}

pub fn eurusd_spec() -> SymbolSpec {
    SymbolSpec {
        value_per_unit: dec!(100000),
        volume_step: dec!(0.01),
        min_volume: dec!(0.01),
        max_volume: None,
        min_stop_distance: dec!(0.0005),
        tick_size: Some(dec!(0.00001)),
    }
}

/// 10k account, 0.5% per trade, 1% per-symbol cap, all state under `dir`.
pub fn config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.risk.per_trade_risk_pct = dec!(0.005);
    config.risk.per_symbol_open_risk_cap_pct = dec!(0.01);
    config.risk.ledger_path = dir.join("open_risk.json");
    config.drawdown.initial_balance = dec!(10000);
    config.drawdown.state_path = dir.join("drawdown.json");
    config.onboarding.state_path = dir.join("onboarding.json");
    config.persistence.journal_dir = dir.join("journal");
    config.bars.path = dir.join("bars.jsonl");
    config.symbols.insert("EURUSD".to_string(), eurusd_spec());
    config
}

/// Same as [`config`] with EURUSD starting observe-only.
pub fn observe_only_config(dir: &Path) -> AppConfig {
    let mut config = config(dir);
    config.onboarding.symbols.insert(
        "EURUSD".to_string(),
        SymbolOnboardingConfig {
            initial_state: Some(OnboardingStatus::ObserveOnly),
            ..Default::default()
        },
    );
    config
}

pub struct Harness {
    pub pipeline: DecisionPipeline,
    pub sink: Arc<MemoryEventSink>,
    pub executor: Arc<MockExecutor>,
}

pub fn harness(config: &AppConfig) -> Harness {
    let sink = Arc::new(MemoryEventSink::new());
    let executor = Arc::new(MockExecutor::new());
    let pipeline = DecisionPipeline::open(config, sink.clone(), executor.clone()).unwrap();
    Harness {
        pipeline,
        sink,
        executor,
    }
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

/// Buy at 1.1000 with a 10 pip stop.
pub fn buy_signal(bar_time: DateTime<Utc>) -> Signal {
    Signal {
        symbol: eurusd(),
        direction: Direction::Buy,
        bar_time,
        entry_price: Price::new(dec!(1.1000)),
        stop_distance: dec!(0.0010),
        take_profit_distance: None,
        atr: None,
    }
}

/// FVG at RR 1.8 (below the default floor) and ATR at RR 2.2.
pub fn buy_zones() -> Vec<CandidateZone> {
    vec![
        CandidateZone::new(
            ExitMethod::FairValueGap,
            Price::new(dec!(1.0990)),
            Price::new(dec!(1.1018)),
        ),
        CandidateZone::new(
            ExitMethod::AtrFallback,
            Price::new(dec!(1.0990)),
            Price::new(dec!(1.1022)),
        ),
    ]
}

pub fn signal_bar(bar_time: DateTime<Utc>, equity: Decimal) -> BarInput {
    BarInput {
        bar_time,
        equity,
        symbols: vec![SymbolBar {
            symbol: eurusd(),
            session_present: true,
            signal: Some(buy_signal(bar_time)),
            zones: buy_zones(),
        }],
        closed: Vec::new(),
    }
}

pub fn quiet_bar(bar_time: DateTime<Utc>, equity: Decimal) -> BarInput {
    BarInput {
        bar_time,
        equity,
        symbols: vec![SymbolBar {
            symbol: eurusd(),
            session_present: true,
            signal: None,
            zones: Vec::new(),
        }],
        closed: Vec::new(),
    }
}

pub fn decision_id(bar_time: DateTime<Utc>) -> DecisionId {
    DecisionId::new(&eurusd(), bar_time)
}

/// Events with wall-clock latency zeroed.
pub fn normalized(events: Vec<DecisionEvent>) -> Vec<DecisionEvent> {
    events
        .into_iter()
        .map(|e| match e {
            DecisionEvent::OrderSubmitted {
                decision_id,
                symbol,
                bar_time,
                broker_ref,
                ..
            } => DecisionEvent::OrderSubmitted {
                decision_id,
                symbol,
                bar_time,
                broker_ref,
                latency_ms: 0,
            },
            other => other,
        })
        .collect()
}
