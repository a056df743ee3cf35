//! Durable session storage
//!
//! - `session`: the append-only detection log of the active run
//! - `atomic`: temp-file + rename JSON writes shared by the session files
//! - `archive`: moving or deleting finished run archives
//! - `lockfile`: single-writer guard on the session directory

pub mod archive;
mod atomic;
pub mod lockfile;
mod session;

pub use archive::{archive_runs, ArchiveMode, ArchiveOutcome};
pub use atomic::write_json_atomic;
pub use lockfile::ProcessLock;
pub use session::{unique_archive_path, SessionError, SessionStore};
