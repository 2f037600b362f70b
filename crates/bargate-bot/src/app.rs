//! Main application orchestration.
//!
//! Coordinates:
//! - bar replay from a `BarSource`
//! - the decision pipeline
//! - event fan-out (tracing + metrics, JSON Lines journal, session stats)
//! - session statistics at each trading day rollover and at shutdown

use std::collections::BTreeMap;
use std::sync::Arc;

use bargate_core::{DecisionId, Symbol};
use bargate_executor::{DryRunExecutor, Executor};
use bargate_onboarding::SymbolOnboardingState;
use bargate_persistence::EventJournal;
use bargate_risk::{DailyEquityWindow, HaltRecord};
use bargate_telemetry::{
    EventSink, FanoutSink, Metrics, SessionStatsReporter, TracingEventSink,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::bar_source::BarSource;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::pipeline::{DecisionPipeline, SymbolOutcome};

/// Counts for one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub bars: u64,
    pub executed: u64,
    pub observe_only: u64,
    pub rejected: u64,
    pub broker_rejected: u64,
}

/// Persisted state snapshot for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub onboarding: Vec<SymbolOnboardingState>,
    pub drawdown_window: Option<DailyEquityWindow>,
    pub halt: Option<HaltRecord>,
    pub open_risk: BTreeMap<Symbol, Vec<(DecisionId, Decimal)>>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    pipeline: DecisionPipeline,
    journal: Arc<EventJournal>,
    stats: Arc<SessionStatsReporter>,
}

impl Application {
    /// Create the application with the configured executor.
    ///
    /// No broker client is linked into this workspace, so `executor.dry_run`
    /// must be set; embed a broker with [`Self::with_executor`].
    pub fn new(config: AppConfig) -> AppResult<Self> {
        if !config.executor.dry_run {
            return Err(AppError::Config(
                "executor.dry_run = false requires a broker executor; use Application::with_executor"
                    .to_string(),
            ));
        }
        Self::with_executor(config, Arc::new(DryRunExecutor::new()))
    }

    /// Create the application around an external executor.
    pub fn with_executor(config: AppConfig, executor: Arc<dyn Executor>) -> AppResult<Self> {
        let journal = Arc::new(EventJournal::new(
            &config.persistence.journal_dir,
            config.persistence.buffer_size,
        ));
        let stats = Arc::new(SessionStatsReporter::new());
        let sink: Arc<dyn EventSink> = Arc::new(
            FanoutSink::new()
                .with(Arc::new(TracingEventSink))
                .with(journal.clone())
                .with(stats.clone()),
        );

        let pipeline = DecisionPipeline::open(&config, sink, executor)?;
        Ok(Self {
            config,
            pipeline,
            journal,
            stats,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &DecisionPipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> &SessionStatsReporter {
        &self.stats
    }

    /// Process bars until the source is exhausted or a stop is requested.
    ///
    /// The stop signal is only observed between bars; a bar that has started
    /// always completes.
    pub async fn run(&self, source: &mut dyn BarSource) -> AppResult<RunSummary> {
        info!("Starting application");

        let mut summary = RunSummary::default();
        let mut last_bar_time: Option<DateTime<Utc>> = None;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut ctrl_c => {
                    info!("Shutdown signal received");
                    break Ok(());
                }

                next = async { source.next_bar() } => {
                    let bar = match next {
                        Ok(Some(bar)) => bar,
                        Ok(None) => {
                            info!("Bar source exhausted");
                            break Ok(());
                        }
                        Err(e) => break Err(e),
                    };

                    let report = match self.pipeline.process_bar(&bar).await {
                        Ok(report) => report,
                        Err(e) => break Err(e),
                    };

                    if report.drawdown.day_rolled && last_bar_time.is_some() {
                        self.stats.rollover(bar.bar_time);
                    }
                    last_bar_time = Some(bar.bar_time);
                    summary.bars += 1;

                    for (_, outcome) in &report.outcomes {
                        match outcome {
                            SymbolOutcome::Executed { .. } => summary.executed += 1,
                            SymbolOutcome::ObserveOnly { .. } => summary.observe_only += 1,
                            SymbolOutcome::Rejected(_) => summary.rejected += 1,
                            SymbolOutcome::BrokerRejected { .. } => summary.broker_rejected += 1,
                            SymbolOutcome::Idle | SymbolOutcome::AlreadyExecuted(_) => {}
                        }
                    }
                }
            }
        };

        self.shutdown(last_bar_time.unwrap_or_else(Utc::now));

        match result {
            Ok(()) => {
                info!(
                    bars = summary.bars,
                    executed = summary.executed,
                    observe_only = summary.observe_only,
                    rejected = summary.rejected,
                    broker_rejected = summary.broker_rejected,
                    "Shutting down"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, bars = summary.bars, "Stopping on error");
                Err(e)
            }
        }
    }

    fn shutdown(&self, now: DateTime<Utc>) {
        info!("Final statistics summary:");
        self.stats.output_summary(now);

        if let Err(e) = self.journal.close() {
            warn!(?e, "Failed to close event journal");
        }

        if let Some(path) = &self.config.telemetry.metrics_textfile {
            match Metrics::write_textfile(path) {
                Ok(()) => info!(path = %path.display(), "Metrics snapshot written"),
                Err(e) => warn!(?e, path = %path.display(), "Failed to write metrics snapshot"),
            }
        }
    }

    /// Snapshot of all persisted state.
    pub fn status(&self) -> StatusReport {
        let sizer = self.pipeline.sizer();
        StatusReport {
            onboarding: self.pipeline.onboarding().snapshot(),
            drawdown_window: sizer.guard().window(),
            halt: sizer.guard().halt_record(),
            open_risk: sizer.ledger().snapshot(),
        }
    }

    /// Operator action: promote a symbol.
    pub fn promote(&self, symbol: &Symbol) -> AppResult<SymbolOnboardingState> {
        Ok(self.pipeline.onboarding().promote(symbol, Utc::now())?)
    }

    /// Operator action: demote a symbol to observe-only.
    pub fn demote(&self, symbol: &Symbol) -> AppResult<SymbolOnboardingState> {
        Ok(self.pipeline.onboarding().demote(symbol)?)
    }

    /// Operator action: clear the total-loss halt latch.
    pub fn reset_halt(&self) -> AppResult<Option<HaltRecord>> {
        let guard = self.pipeline.sizer().guard();
        let previous = guard.halt_record();
        guard.reset_halt()?;
        Ok(previous)
    }
}
