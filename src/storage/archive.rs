//! Housekeeping for finished runs: move or delete `detections_*.json` archives.

use crate::config::defaults;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Move into a new `detections_archive_<YYYYmmdd_HHMMSS>/` directory.
    Move,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub files: Vec<PathBuf>,
    /// Set when files were moved.
    pub destination: Option<PathBuf>,
}

/// Run archives in `dir`, sorted by name. The current-run file never matches.
pub fn find_run_archives(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(defaults::ARCHIVE_FILE_PREFIX) && name.ends_with(".json") {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Move or delete every run archive in `dir`.
pub fn archive_runs(
    dir: &Path,
    mode: ArchiveMode,
    now: DateTime<Local>,
) -> io::Result<ArchiveOutcome> {
    let files = find_run_archives(dir)?;
    if files.is_empty() {
        return Ok(ArchiveOutcome {
            files,
            destination: None,
        });
    }

    match mode {
        ArchiveMode::Delete => {
            for file in &files {
                fs::remove_file(file)?;
                tracing::info!("  Deleted: {}", file.display());
            }
            Ok(ArchiveOutcome {
                files,
                destination: None,
            })
        }
        ArchiveMode::Move => {
            let destination = dir.join(format!(
                "{}{}",
                defaults::ARCHIVE_DIR_PREFIX,
                now.format("%Y%m%d_%H%M%S")
            ));
            fs::create_dir_all(&destination)?;
            for file in &files {
                if let Some(name) = file.file_name() {
                    fs::rename(file, destination.join(name))?;
                    tracing::info!("  Archived: {}", file.display());
                }
            }
            Ok(ArchiveOutcome {
                files,
                destination: Some(destination),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn seed(dir: &Path) {
        fs::write(dir.join("detections_100.json"), "[]").unwrap();
        fs::write(dir.join("detections_200.json"), "[]").unwrap();
        fs::write(dir.join("current_session.json"), "[]").unwrap();
        fs::write(dir.join("notes.txt"), "keep").unwrap();
    }

    #[test]
    fn moves_archives_and_leaves_current_session() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        let now = Local.with_ymd_and_hms(2026, 3, 1, 8, 15, 30).unwrap();

        let outcome = archive_runs(dir.path(), ArchiveMode::Move, now).unwrap();

        let dest = dir.path().join("detections_archive_20260301_081530");
        assert_eq!(outcome.destination.as_deref(), Some(dest.as_path()));
        assert_eq!(outcome.files.len(), 2);
        assert!(dest.join("detections_100.json").exists());
        assert!(dest.join("detections_200.json").exists());
        assert!(dir.path().join("current_session.json").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn delete_removes_only_archives() {
        let dir = tempdir().unwrap();
        seed(dir.path());

        let outcome = archive_runs(dir.path(), ArchiveMode::Delete, Local::now()).unwrap();
        assert_eq!(outcome.files.len(), 2);
        assert!(find_run_archives(dir.path()).unwrap().is_empty());
        assert!(dir.path().join("current_session.json").exists());
    }

    #[test]
    fn nothing_to_do_creates_no_directory() {
        let dir = tempdir().unwrap();
        let outcome = archive_runs(dir.path(), ArchiveMode::Move, Local::now()).unwrap();
        assert!(outcome.files.is_empty());
        assert!(outcome.destination.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
