//! Bar-close inputs and the sources that replay them.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use bargate_core::{CandidateZone, DecisionId, Signal, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// One symbol's inputs on a bar close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolBar {
    pub symbol: Symbol,
    /// Trading session open for this symbol on this bar.
    #[serde(default = "default_session_present")]
    pub session_present: bool,
    /// Strategy signal, if any fired.
    #[serde(default)]
    pub signal: Option<Signal>,
    /// Structure detector output for this bar.
    #[serde(default)]
    pub zones: Vec<CandidateZone>,
}

fn default_session_present() -> bool {
    true
}

/// Everything the pipeline needs for one bar close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarInput {
    pub bar_time: DateTime<Utc>,
    /// Account equity at bar close.
    pub equity: Decimal,
    #[serde(default)]
    pub symbols: Vec<SymbolBar>,
    /// Decisions whose positions closed since the previous bar.
    #[serde(default)]
    pub closed: Vec<DecisionId>,
}

/// Source of bar-close inputs, one at a time.
pub trait BarSource: Send {
    /// Next bar, or `None` when the source is exhausted.
    fn next_bar(&mut self) -> AppResult<Option<BarInput>>;
}

/// Replays `BarInput` records from a JSON Lines file.
pub struct JsonlBarSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonlBarSource {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        info!(path = %path.display(), "Bar source opened");
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BarSource for JsonlBarSource {
    fn next_bar(&mut self) -> AppResult<Option<BarInput>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let bar: BarInput =
                serde_json::from_str(trimmed).map_err(|e| AppError::BarInput {
                    line: self.line_no,
                    reason: e.to_string(),
                })?;
            debug!(line = self.line_no, bar_time = %bar.bar_time, "Bar read");
            return Ok(Some(bar));
        }
        Ok(None)
    }
}

/// In-memory bar source.
#[derive(Debug, Default)]
pub struct MemoryBarSource {
    bars: VecDeque<BarInput>,
}

impl MemoryBarSource {
    pub fn new(bars: impl IntoIterator<Item = BarInput>) -> Self {
        Self {
            bars: bars.into_iter().collect(),
        }
    }
}

impl BarSource for MemoryBarSource {
    fn next_bar(&mut self) -> AppResult<Option<BarInput>> {
        Ok(self.bars.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_jsonl_source_reads_bars_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bars.jsonl");
        let mut f = File::create(&path).unwrap();
        writeln!(
            f,
            r#"{{"bar_time":"2024-03-01T10:00:00Z","equity":"10000","symbols":[{{"symbol":"EURUSD"}}]}}"#
        )
        .unwrap();
        writeln!(f).unwrap();
        writeln!(
            f,
            r#"{{"bar_time":"2024-03-01T11:00:00Z","equity":"9990","closed":["EURUSD@1709287200000"]}}"#
        )
        .unwrap();
        drop(f);

        let mut source = JsonlBarSource::open(&path).unwrap();
        let first = source.next_bar().unwrap().unwrap();
        assert_eq!(first.symbols.len(), 1);
        assert!(first.symbols[0].session_present);
        assert!(first.symbols[0].signal.is_none());

        let second = source.next_bar().unwrap().unwrap();
        assert_eq!(second.closed.len(), 1);
        assert!(second.symbols.is_empty());

        assert!(source.next_bar().unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bars.jsonl");
        std::fs::write(&path, "{\"bar_time\":\"2024-03-01T10:00:00Z\",\"equity\":\"1\"}\nnot json\n")
            .unwrap();

        let mut source = JsonlBarSource::open(&path).unwrap();
        assert!(source.next_bar().unwrap().is_some());
        match source.next_bar() {
            Err(AppError::BarInput { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected bar input error, got {other:?}"),
        }
    }
}
