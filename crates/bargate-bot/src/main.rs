//! bargate - per-bar trade decision gating - Entry Point

use std::path::PathBuf;

use anyhow::Result;
use bargate_bot::{AppConfig, Application, JsonlBarSource};
use bargate_core::Symbol;
use clap::{Parser, Subcommand};
use tracing::info;

/// bargate decision pipeline
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via BARGATE_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay bars through the pipeline (default)
    Run {
        /// Bar input file; overrides `bars.path`
        #[arg(long)]
        bars: Option<PathBuf>,
    },
    /// Print persisted onboarding, drawdown and open-risk state as JSON
    Status,
    /// Promote a symbol to live execution
    Promote { symbol: String },
    /// Return a symbol to observe-only
    Demote { symbol: String },
    /// Clear the total-loss halt latch
    ResetHalt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    bargate_telemetry::init_logging()?;

    info!("Starting bargate v{}", env!("CARGO_PKG_VERSION"));

    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::load(&config_path)?;

    let command = args.command.unwrap_or(Command::Run { bars: None });

    // State files are loaded here; a corrupt file stops the process before any bar.
    let app = Application::new(config)?;

    match command {
        Command::Run { bars } => {
            let path = bars.unwrap_or_else(|| app.config().bars.path.clone());
            let mut source = JsonlBarSource::open(&path)?;
            let summary = app.run(&mut source).await?;
            info!(?summary, "Run complete");
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&app.status())?);
        }
        Command::Promote { symbol } => {
            let state = app.promote(&Symbol::from(symbol))?;
            info!(symbol = %state.symbol, state = %state.state, "Promoted");
        }
        Command::Demote { symbol } => {
            let state = app.demote(&Symbol::from(symbol))?;
            info!(symbol = %state.symbol, state = %state.state, "Demoted");
        }
        Command::ResetHalt => match app.reset_halt()? {
            Some(previous) => info!(reason = %previous.reason, "Halt latch cleared"),
            None => info!("Halt latch was not set"),
        },
    }

    Ok(())
}
