//! Whole-file JSON state with atomic replacement.
//!
//! Writes go to a sibling `.tmp` file which is fsynced and renamed over the
//! target, so a crash mid-write leaves either the old or the new contents.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PersistenceError, PersistenceResult};

/// A JSON state file on disk.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file.
    ///
    /// Returns `Ok(None)` if the file does not exist. A file that exists but
    /// cannot be read or parsed is an error.
    pub fn load<T: DeserializeOwned>(&self) -> PersistenceResult<Option<T>> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "State file not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Replace the file contents atomically.
    pub fn save<T: Serialize>(&self, value: &T) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(value)?;
        let tmp_path = self.tmp_path();
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            // Clean up temp file on rename failure
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                warn!(?cleanup, path = %tmp_path.display(), "Failed to remove temp state file");
            }
            return Err(e.into());
        }

        debug!(path = %self.path.display(), bytes = json.len(), "State file saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
