//! Process lock for the session directory.
//!
//! The session store must be the only writer of the current-run file, so a
//! second detector (or an `archive` run) pointed at the same directory is
//! refused while the first is alive.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// PID lock file held for the lifetime of a run.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    const LOCK_FILE_NAME: &'static str = ".sentinel.lock";

    /// Take the lock in `session_dir`, clearing it first if its owner is gone.
    pub fn acquire<P: AsRef<Path>>(session_dir: P) -> Result<Self> {
        let session_dir = session_dir.as_ref();
        fs::create_dir_all(session_dir).with_context(|| {
            format!("Failed to create session directory {}", session_dir.display())
        })?;

        let lock_path = session_dir.join(Self::LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::holder(&lock_path) {
                Some(pid) if pid != std::process::id() => bail!(
                    "Another cabai-sentinel instance (PID {}) is using {}\n\
                     Stop it first, or remove {} if it is no longer running.",
                    pid,
                    session_dir.display(),
                    lock_path.display()
                ),
                _ => {
                    tracing::info!("Removing stale lock file {}", lock_path.display());
                    fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
                }
            }
        }

        let pid = std::process::id();
        fs::write(&lock_path, format!("{pid}\n"))
            .with_context(|| format!("Failed to write lock file {}", lock_path.display()))?;
        tracing::debug!(pid, path = %lock_path.display(), "Acquired process lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// PID of a live process holding `lock_path`, if any.
    fn holder(lock_path: &Path) -> Option<u32> {
        let pid: u32 = fs::read_to_string(lock_path).ok()?.trim().parse().ok()?;
        Self::is_sentinel_process(pid).then_some(pid)
    }

    #[cfg(unix)]
    fn is_sentinel_process(pid: u32) -> bool {
        fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .map(|cmdline| cmdline.contains("cabai-sentinel") || cmdline.contains("cabai_sentinel"))
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_sentinel_process(_pid: u32) -> bool {
        true
    }

    /// Remove the lock file. Also runs on drop.
    pub fn release(&mut self) {
        if self.owned {
            match fs::remove_file(&self.lock_path) {
                Ok(()) => tracing::debug!(path = %self.lock_path.display(), "Released process lock"),
                Err(e) => tracing::warn!(error = %e, "Failed to remove lock file"),
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}
