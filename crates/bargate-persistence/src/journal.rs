//! JSON Lines journal for decision events.
//!
//! Uses JSON Lines format (.jsonl):
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Files rotate by the record's own date, so replays write identical files

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bargate_telemetry::{DecisionEvent, EventSink};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// Active writer state for a daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: NaiveDate,
    records_written: usize,
}

/// Buffered, append-only JSON Lines writer with daily rotation.
pub struct JsonLinesWriter<T: Serialize> {
    base_dir: PathBuf,
    prefix: String,
    buffer: Vec<(NaiveDate, T)>,
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
}

impl<T: Serialize> JsonLinesWriter<T> {
    /// Create a writer producing `{base_dir}/{prefix}_{YYYY-MM-DD}.jsonl`.
    pub fn new(base_dir: impl AsRef<Path>, prefix: &str, max_buffer_size: usize) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            warn!(?e, dir = %base_dir.display(), "Failed to create journal directory");
        }

        Self {
            base_dir,
            prefix: prefix.to_string(),
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            active_writer: None,
        }
    }

    /// Buffer a record dated `date`; flushes when the buffer is full.
    pub fn add_record(&mut self, date: NaiveDate, record: T) -> PersistenceResult<()> {
        self.buffer.push((date, record));

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    /// Path of the file for `date`.
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}.jsonl", self.prefix, date.format("%Y-%m-%d")))
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush journal on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines journal"
            );
        }
    }

    fn open_writer(&mut self, date: NaiveDate) -> PersistenceResult<()> {
        let filename = self.file_for(date);
        debug!(filename = %filename.display(), "Opening JSON Lines journal (append mode)");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.active_writer = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date,
            records_written: 0,
        });
        Ok(())
    }

    /// Write all buffered records, rotating files on date change.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.buffer);
        let record_count = pending.len();

        for (date, record) in &pending {
            let needs_rotation = self
                .active_writer
                .as_ref()
                .map(|w| w.date != *date)
                .unwrap_or(true);
            if needs_rotation {
                self.close_active_writer();
                self.open_writer(*date)?;
            }

            let json = serde_json::to_string(record)?;
            if let Some(active) = self.active_writer.as_mut() {
                writeln!(active.writer, "{}", json)?;
                active.records_written += 1;
            }
        }

        if let Some(active) = self.active_writer.as_mut() {
            active.writer.flush()?;
        }

        debug!(records = record_count, "Flushed journal");
        Ok(())
    }

    /// Flush pending records and close the file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }
}

impl<T: Serialize> Drop for JsonLinesWriter<T> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, "Failed to flush journal on drop");
        }
        self.close_active_writer();
    }
}

/// Decision event sink writing to `events_{date}.jsonl`.
pub struct EventJournal {
    writer: Mutex<JsonLinesWriter<DecisionEvent>>,
}

impl EventJournal {
    pub fn new(base_dir: impl AsRef<Path>, max_buffer_size: usize) -> Self {
        Self {
            writer: Mutex::new(JsonLinesWriter::new(base_dir, "events", max_buffer_size)),
        }
    }

    pub fn flush(&self) -> PersistenceResult<()> {
        self.writer.lock().flush()
    }

    pub fn close(&self) -> PersistenceResult<()> {
        self.writer.lock().close()
    }
}

impl EventSink for EventJournal {
    fn emit(&self, event: &DecisionEvent) {
        let date = event.bar_time().date_naive();
        if let Err(e) = self.writer.lock().add_record(date, event.clone()) {
            warn!(?e, event = event.name(), "Failed to journal decision event");
        }
    }
}
