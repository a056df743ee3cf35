//! Background task feeding the position cache.

use super::{PositionCache, PositionProvider};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consecutive empty polls after which a lost fix is reported (once).
const FIX_LOST_AFTER_POLLS: u64 = 50;

/// Counters returned when the poller exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerReport {
    pub fixes: u64,
    pub empty_polls: u64,
}

/// Spawn the poll loop for an already-connected provider.
///
/// Polls every `interval`, stores valid fixes and leaves the cache alone on
/// anything else. Exits promptly on `cancel` and closes the provider.
pub fn spawn_position_poller(
    mut provider: Box<dyn PositionProvider>,
    cache: PositionCache,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<PollerReport> {
    tokio::spawn(async move {
        let mut report = PollerReport::default();
        let mut misses_in_row: u64 = 0;
        let mut lost_reported = false;

        info!(
            "[PositionPoller] Started ({}, every {}ms)",
            provider.name(),
            interval.as_millis()
        );

        loop {
            let fix = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                fix = provider.poll() => fix,
            };

            match fix {
                Some(position) => {
                    if report.fixes == 0 {
                        info!(position = %position, satellites = position.satellites, "[PositionPoller] First fix acquired");
                    } else if lost_reported {
                        info!(position = %position, "[PositionPoller] Fix regained");
                    }
                    debug!(position = %position, "[PositionPoller] Fix");
                    cache.replace(position);
                    report.fixes += 1;
                    misses_in_row = 0;
                    lost_reported = false;
                }
                None => {
                    report.empty_polls += 1;
                    misses_in_row += 1;
                    if report.fixes > 0 && !lost_reported && misses_in_row >= FIX_LOST_AFTER_POLLS {
                        warn!(
                            "[PositionPoller] No fix for {} polls, holding last known position",
                            misses_in_row
                        );
                        lost_reported = true;
                    }
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        provider.close().await;
        info!(
            "[PositionPoller] Stopped ({} fixes, {} empty polls)",
            report.fixes, report.empty_polls
        );
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positioning::PositionError;
    use crate::types::Position;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;

    /// Replays a scripted sequence of poll results, then reports nothing.
    struct ScriptedProvider {
        script: VecDeque<Option<Position>>,
    }

    #[async_trait]
    impl PositionProvider for ScriptedProvider {
        async fn connect(&mut self) -> Result<(), PositionError> {
            Ok(())
        }

        async fn poll(&mut self) -> Option<Position> {
            self.script.pop_front().flatten()
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn fix(lat: f64) -> Position {
        Position {
            latitude: lat,
            longitude: 110.0,
            altitude: 0.0,
            satellites: 6,
            fix_quality: 1,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_polls_keep_last_fix() {
        let provider = ScriptedProvider {
            script: VecDeque::from(vec![None, Some(fix(-7.0)), None, None]),
        };
        let cache = PositionCache::new();
        let cancel = CancellationToken::new();
        let handle = spawn_position_poller(
            Box::new(provider),
            cache.clone(),
            Duration::from_millis(1),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.current_position().unwrap().latitude, -7.0);

        cancel.cancel();
        let report = handle.await.unwrap();
        assert_eq!(report.fixes, 1);
        assert!(report.empty_polls >= 3);
        assert_eq!(cache.current_position().unwrap().latitude, -7.0);
    }

    #[tokio::test]
    async fn newer_fix_replaces_cached_one() {
        let provider = ScriptedProvider {
            script: VecDeque::from(vec![Some(fix(-7.0)), None, Some(fix(-8.0))]),
        };
        let cache = PositionCache::new();
        let cancel = CancellationToken::new();
        let handle = spawn_position_poller(
            Box::new(provider),
            cache.clone(),
            Duration::from_millis(1),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(cache.current_position().unwrap().latitude, -8.0);
    }

    #[tokio::test]
    async fn stops_on_cancel_during_sleep() {
        let provider = ScriptedProvider {
            script: VecDeque::new(),
        };
        let cancel = CancellationToken::new();
        let handle = spawn_position_poller(
            Box::new(provider),
            PositionCache::new(),
            Duration::from_secs(3600),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(joined.is_ok(), "poller did not observe cancellation");
    }
}
