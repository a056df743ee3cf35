//! Session store: the run's append-only detection log.
//!
//! Every append rewrites the whole "current run" file, so a missed write is
//! superseded by the next successful one and readers always get a complete
//! JSON array. At shutdown the log is also written to a per-run archive.

use super::atomic::write_json_atomic;
use crate::config::{defaults, SessionConfig};
use crate::types::DetectionEvent;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to write session file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct SessionStore {
    current_path: PathBuf,
    archive_dir: PathBuf,
    events: Vec<DetectionEvent>,
    write_failures: u64,
}

impl SessionStore {
    pub fn new(current_path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_path: current_path.into(),
            archive_dir: archive_dir.into(),
            events: Vec::new(),
            write_failures: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.current_path(), config.directory.clone())
    }

    fn write(&mut self, path: &Path) -> Result<(), SessionError> {
        write_json_atomic(path, &self.events).map_err(|source| {
            self.write_failures += 1;
            SessionError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Start a fresh run: empty log, current file replaced by `[]`.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.events.clear();
        let path = self.current_path.clone();
        self.write(&path)?;
        info!(path = %path.display(), "Session log reset");
        Ok(())
    }

    /// Append an event and persist the full log to the current-run file.
    ///
    /// The event is kept in memory even when the write fails.
    pub fn append(&mut self, event: DetectionEvent) -> Result<(), SessionError> {
        self.events.push(event);
        let path = self.current_path.clone();
        self.write(&path)?;
        debug!(events = self.events.len(), "Session log flushed");
        Ok(())
    }

    /// Final write: the current-run file and a new archive named after `run_id`.
    ///
    /// Returns the archive path. A failed current-file write is logged; the
    /// archive is still attempted.
    pub fn finalize(&mut self, run_id: i64) -> Result<PathBuf, SessionError> {
        let current = self.current_path.clone();
        if let Err(e) = self.write(&current) {
            warn!(error = %e, "Final write of current session failed");
        }

        let archive = unique_archive_path(&self.archive_dir, run_id);
        self.write(&archive)?;
        info!(
            path = %archive.display(),
            events = self.events.len(),
            "Session archived"
        );
        Ok(archive)
    }

    pub fn events(&self) -> &[DetectionEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }
}

/// `detections_<run_id>.json`, or `detections_<run_id>_<n>.json` if taken.
pub fn unique_archive_path(dir: &Path, run_id: i64) -> PathBuf {
    let base = format!("{}{}", defaults::ARCHIVE_FILE_PREFIX, run_id);
    let mut candidate = dir.join(format!("{base}.json"));
    let mut n: u32 = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{base}_{n}.json"));
        n += 1;
    }
    candidate
}
