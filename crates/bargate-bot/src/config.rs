//! Application configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bargate_core::{Symbol, SymbolSpec};
use bargate_executor::ExecutorConfig;
use bargate_exit::ExitConfig;
use bargate_onboarding::OnboardingConfig;
use bargate_risk::{DrawdownConfig, RiskConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BARGATE_CONFIG";

/// Config file used when neither CLI nor environment name one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Decision event journal (`[persistence]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory for `events_{date}.jsonl`. Default: "data/journal".
    #[serde(default = "default_journal_dir")]
    pub journal_dir: PathBuf,
    /// Records buffered before a flush. Default: 100.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("data/journal")
}

fn default_buffer_size() -> usize {
    100
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            journal_dir: default_journal_dir(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// Telemetry output (`[telemetry]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus text-file snapshot written at shutdown.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

/// Bar replay input (`[bars]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarsConfig {
    /// JSON Lines file of `BarInput` records. Default: "data/bars.jsonl".
    #[serde(default = "default_bars_path")]
    pub path: PathBuf,
}

fn default_bars_path() -> PathBuf {
    PathBuf::from("data/bars.jsonl")
}

impl Default for BarsConfig {
    fn default() -> Self {
        Self {
            path: default_bars_path(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub drawdown: DrawdownConfig,
    #[serde(default)]
    pub exit: ExitConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    /// Broker constraints per symbol (`[symbols.EURUSD]`).
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolSpec>,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub bars: BarsConfig,
}

impl AppConfig {
    /// Config path: CLI arg > `BARGATE_CONFIG` > `config/default.toml`.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from a file, falling back to defaults only when the default
    /// path is absent. An explicitly named file must exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
            warn!(path = %path, "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::from_file(path)
    }

    /// Load and validate a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Any violation is fatal.
    pub fn validate(&self) -> AppResult<()> {
        self.risk
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.drawdown
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.exit
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.executor
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.onboarding
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        for (symbol, spec) in &self.symbols {
            spec.validate(symbol)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }
        if self.persistence.buffer_size == 0 {
            return Err(AppError::Config(
                "persistence.buffer_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Broker constraints for `symbol`, keyed by configured symbol name.
    pub fn symbol_specs(&self) -> BTreeMap<Symbol, SymbolSpec> {
        self.symbols
            .iter()
            .map(|(s, spec)| (Symbol::from(s.as_str()), spec.clone()))
            .collect()
    }
}
