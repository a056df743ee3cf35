//! Session Store Integration Tests
//!
//! The current-run file must always hold a complete, ordered JSON array,
//! whatever a concurrent reader catches. Also covers run archiving and the
//! session directory lock.

use cabai_sentinel::storage::{archive_runs, ArchiveMode, ProcessLock, SessionStore};
use cabai_sentinel::{Detection, DetectionEvent, Position};
use chrono::{Local, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn event(i: usize) -> DetectionEvent {
    let labels = ["antraknosa", "cabai_normal", "lalat_buah"];
    let position = (i % 2 == 0).then(|| Position {
        latitude: -7.0 - i as f64 * 1e-4,
        longitude: 110.0 + i as f64 * 1e-4,
        altitude: 100.0,
        satellites: 8,
        fix_quality: 1,
        observed_at: Utc::now(),
    });
    let confidence = 0.5 + (i % 50) as f32 / 100.0;
    DetectionEvent::from_detection(&Detection::new(labels[i % 3], confidence), position)
}

#[test]
fn appends_are_monotonic_under_concurrent_reads() {
    let dir = tempfile::tempdir().unwrap();
    let current = dir.path().join("current_session.json");
    let mut store = SessionStore::new(&current, dir.path());
    store.reset().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let done = Arc::clone(&done);
        let current = current.clone();
        thread::spawn(move || {
            let mut snapshots = Vec::new();
            while !done.load(Ordering::Acquire) {
                let raw = std::fs::read_to_string(&current).unwrap();
                let events: Vec<DetectionEvent> =
                    serde_json::from_str(&raw).expect("reader saw a partial file");
                snapshots.push(events);
            }
            snapshots
        })
    };

    let written: Vec<DetectionEvent> = (0..200).map(event).collect();
    for e in &written {
        store.append(e.clone()).unwrap();
    }
    done.store(true, Ordering::Release);
    let snapshots = reader.join().unwrap();

    // Every snapshot is a prefix of the final log, and they only grow.
    let mut last_len = 0;
    for snapshot in &snapshots {
        assert!(snapshot.len() >= last_len, "snapshot shrank");
        assert_eq!(snapshot.as_slice(), &written[..snapshot.len()]);
        last_len = snapshot.len();
    }

    let on_disk: Vec<DetectionEvent> =
        serde_json::from_str(&std::fs::read_to_string(&current).unwrap()).unwrap();
    assert_eq!(on_disk, written);
    assert_eq!(store.len(), 200);
    assert_eq!(store.write_failures(), 0);
}

#[test]
fn finalize_never_overwrites_an_earlier_run() {
    let dir = tempfile::tempdir().unwrap();
    let current = dir.path().join("current_session.json");

    let mut first = SessionStore::new(&current, dir.path());
    first.reset().unwrap();
    first.append(event(0)).unwrap();
    let first_archive = first.finalize(1_700_000_000).unwrap();

    let mut second = SessionStore::new(&current, dir.path());
    second.reset().unwrap();
    let second_archive = second.finalize(1_700_000_000).unwrap();

    assert_ne!(first_archive, second_archive);
    let first_events: Vec<DetectionEvent> =
        serde_json::from_str(&std::fs::read_to_string(&first_archive).unwrap()).unwrap();
    assert_eq!(first_events.len(), 1);
    assert_eq!(std::fs::read_to_string(&second_archive).unwrap().trim(), "[]");
}

#[test]
fn archive_moves_finished_runs_but_not_the_current_file() {
    let dir = tempfile::tempdir().unwrap();
    let current = dir.path().join("current_session.json");
    let mut store = SessionStore::new(&current, dir.path());
    store.reset().unwrap();
    store.append(event(0)).unwrap();
    store.finalize(100).unwrap();
    store.finalize(200).unwrap();

    let now = Local.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
    let outcome = archive_runs(dir.path(), ArchiveMode::Move, now).unwrap();

    assert_eq!(outcome.files.len(), 2);
    let dest = outcome.destination.unwrap();
    assert_eq!(dest.file_name().unwrap(), "detections_archive_20260314_093000");
    assert!(dest.join("detections_100.json").exists());
    assert!(dest.join("detections_200.json").exists());
    assert!(current.exists(), "current-run file is never archived");
}

#[test]
fn archive_delete_removes_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::new(dir.path().join("current_session.json"), dir.path());
    store.finalize(42).unwrap();

    let outcome = archive_runs(dir.path(), ArchiveMode::Delete, Local::now()).unwrap();
    assert_eq!(outcome.files.len(), 1);
    assert!(outcome.destination.is_none());
    assert!(!dir.path().join("detections_42.json").exists());
}

#[test]
fn lock_can_be_retaken_after_release() {
    let dir = tempfile::tempdir().unwrap();
    let mut lock = ProcessLock::acquire(dir.path()).unwrap();
    assert!(lock.path().exists());

    lock.release();
    assert!(!lock.path().exists());
    let _again = ProcessLock::acquire(dir.path()).unwrap();
}
