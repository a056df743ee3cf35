//! Last-known-good position fix, shared between the poller and the frame loop.

use crate::types::Position;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Sticky, lock-free position cache.
///
/// The poll task is the only writer and only ever stores valid fixes, so once
/// a fix is present the cache never goes back to empty. Readers take a
/// snapshot without blocking; a replace swaps the whole `Position` at once,
/// so a reader sees either the old fix or the new one, never a mix.
#[derive(Clone)]
pub struct PositionCache {
    inner: Arc<ArcSwapOption<Position>>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Snapshot of the cached fix, or `None` if no valid fix was ever seen.
    pub fn current_position(&self) -> Option<Position> {
        self.inner.load_full().map(|fix| (*fix).clone())
    }

    /// Replace the cached fix with a newer valid one.
    pub fn replace(&self, fix: Position) {
        self.inner.store(Some(Arc::new(fix)));
    }

    pub fn has_fix(&self) -> bool {
        self.inner.load().is_some()
    }
}

impl Default for PositionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PositionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionCache")
            .field("fix", &self.inner.load_full())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fix(v: f64) -> Position {
        Position {
            latitude: v,
            longitude: v,
            altitude: v,
            satellites: v as u32,
            fix_quality: 1,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn empty_until_first_fix() {
        let cache = PositionCache::new();
        assert!(cache.current_position().is_none());
        assert!(!cache.has_fix());

        cache.replace(fix(1.0));
        assert_eq!(cache.current_position().unwrap().latitude, 1.0);
    }

    #[test]
    fn newer_fix_replaces_older() {
        let cache = PositionCache::new();
        cache.replace(fix(1.0));
        cache.replace(fix(2.0));
        assert_eq!(cache.current_position().unwrap().longitude, 2.0);
    }

    #[test]
    fn snapshot_is_detached_from_later_updates() {
        let cache = PositionCache::new();
        cache.replace(fix(1.0));
        let snapshot = cache.current_position().unwrap();
        cache.replace(fix(2.0));
        assert_eq!(snapshot.latitude, 1.0);
    }

    #[test]
    fn clones_share_the_same_fix() {
        let writer = PositionCache::new();
        let reader = writer.clone();
        writer.replace(fix(3.0));
        assert_eq!(reader.current_position().unwrap().altitude, 3.0);
    }

    #[test]
    fn readers_never_observe_hybrid_fixes() {
        let cache = PositionCache::new();
        cache.replace(fix(1.0));
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let cache = cache.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut v = 1.0;
                while !stop.load(Ordering::Relaxed) {
                    v = if v == 1.0 { 2.0 } else { 1.0 };
                    cache.replace(fix(v));
                }
            })
        };

        for _ in 0..100_000 {
            let p = cache.current_position().unwrap();
            assert_eq!(p.latitude, p.longitude);
            assert_eq!(p.latitude, p.altitude);
            assert_eq!(p.satellites, p.latitude as u32);
        }

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }
}
