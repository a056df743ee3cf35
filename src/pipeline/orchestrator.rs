//! The detection loop.
//!
//! ```text
//! Starting ──► Running ──► Draining ──► Stopped
//!    │                                     ▲
//!    └──── frame source unavailable ───────┘
//! ```
//!
//! Per frame: pull → process gate → classify → known-label filter →
//! LEDs → sample gate → (position snapshot, session append, publish).
//!
//! The position poller is the only other task. It shares nothing with the
//! loop except the [`PositionCache`], and it is stopped and joined while
//! draining.

use super::cadence::{CadenceController, CadenceError};
use super::source::{FrameEvent, FrameSource, SourceError};
use super::stats::{EndReason, RunStats, RunSummary, StatsTicker};
use crate::actuator::ActuatorSync;
use crate::classifier::{active_labels, Classifier, KnownLabelSet};
use crate::config::{defaults, SentinelConfig};
use crate::positioning::{spawn_position_poller, PositionCache, PositionProvider};
use crate::storage::SessionStore;
use crate::telemetry::TelemetryPublisher;
use crate::types::{DetectionEvent, Frame};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid cadence: {0}")]
    InvalidCadence(#[from] CadenceError),

    #[error("frame source '{name}' could not be acquired: {source}")]
    SourceUnavailable {
        name: String,
        #[source]
        source: SourceError,
    },
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Starting => "Starting",
            Phase::Running => "Running",
            Phase::Draining => "Draining",
            Phase::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Which optional collaborators came up at startup.
///
/// Recorded once while starting; the loop branches on this, never on
/// ad-hoc availability checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub positioning: bool,
    pub telemetry: bool,
    pub actuator: bool,
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |on: bool| if on { "on" } else { "off" };
        write!(
            f,
            "GPS: {} | MQTT: {} | LEDs: {}",
            mark(self.positioning),
            mark(self.telemetry),
            mark(self.actuator)
        )
    }
}

/// Loop tunables, usually taken from [`SentinelConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub frame_skip: u32,
    pub sample_every: u32,
    pub known_labels: KnownLabelSet,
    /// Per-frame status and per-event lines.
    pub display: bool,
    pub stats_interval: Duration,
    pub position_poll_interval: Duration,
    pub background_join_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &SentinelConfig) -> Self {
        Self {
            frame_skip: config.cadence.frame_skip,
            sample_every: config.cadence.sample_every,
            known_labels: KnownLabelSet::from_config(&config.classifier),
            display: config.display.enabled,
            stats_interval: config.display.stats_interval(),
            position_poll_interval: config.positioning.poll_interval(),
            background_join_timeout: Duration::from_millis(defaults::BACKGROUND_JOIN_TIMEOUT_MS),
        }
    }
}

/// Owns every component of one run.
///
/// Built with [`new()`](Orchestrator::new), optional collaborators attached
/// with the `with_*` methods, then consumed by [`run()`](Orchestrator::run).
pub struct Orchestrator {
    settings: OrchestratorSettings,
    cadence: CadenceController,
    source: Box<dyn FrameSource>,
    classifier: Box<dyn Classifier>,
    position_provider: Option<Box<dyn PositionProvider>>,
    actuator: ActuatorSync,
    publisher: TelemetryPublisher,
    session: SessionStore,
    cancel: CancellationToken,
    phase: Phase,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        source: Box<dyn FrameSource>,
        classifier: Box<dyn Classifier>,
        session: SessionStore,
        cancel: CancellationToken,
    ) -> Result<Self, OrchestratorError> {
        let cadence = CadenceController::new(settings.frame_skip, settings.sample_every)?;
        Ok(Self {
            settings,
            cadence,
            source,
            classifier,
            position_provider: None,
            actuator: ActuatorSync::new(None, Default::default()),
            publisher: TelemetryPublisher::disabled(),
            session,
            cancel,
            phase: Phase::Starting,
        })
    }

    pub fn with_positioning(mut self, provider: Box<dyn PositionProvider>) -> Self {
        self.position_provider = Some(provider);
        self
    }

    pub fn with_actuator(mut self, actuator: ActuatorSync) -> Self {
        self.actuator = actuator;
        self
    }

    pub fn with_telemetry(mut self, publisher: TelemetryPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        info!("[Orchestrator] {} → {}", self.phase, phase);
        self.phase = phase;
    }

    /// Run until end of stream, stop signal or source failure.
    ///
    /// Only a frame source that cannot be acquired is an error; everything
    /// else degrades and ends up in the summary.
    pub async fn run(mut self) -> Result<RunSummary, OrchestratorError> {
        let mut stats = RunStats::new();

        // ── Starting ──────────────────────────────────────────────────────
        info!(
            "[Orchestrator] Starting (source: {}, classifier: {})",
            self.source.source_name(),
            self.classifier.name()
        );

        if let Err(e) = self.source.open().await {
            error!("[Orchestrator] Frame source unavailable: {}", e);
            self.enter(Phase::Stopped);
            return Err(OrchestratorError::SourceUnavailable {
                name: self.source.source_name().to_string(),
                source: e,
            });
        }

        let cache = PositionCache::new();
        let poller_cancel = self.cancel.child_token();
        let mut poller = None;

        let positioning = match self.position_provider.take() {
            Some(mut provider) => match provider.connect().await {
                Ok(()) => {
                    poller = Some(spawn_position_poller(
                        provider,
                        cache.clone(),
                        self.settings.position_poll_interval,
                        poller_cancel.clone(),
                    ));
                    true
                }
                Err(e) => {
                    warn!("[Orchestrator] GPS unavailable ({}); events will carry no location", e);
                    false
                }
            },
            None => false,
        };
        let telemetry = self.publisher.connect().await;
        let actuator = self.actuator.initialize();

        if let Err(e) = self.session.reset() {
            warn!("[Orchestrator] Could not reset session log: {}", e);
        }

        let capabilities = Capabilities {
            positioning,
            telemetry,
            actuator,
        };
        info!("[Orchestrator] Capabilities: {}", capabilities);

        // ── Running ───────────────────────────────────────────────────────
        self.enter(Phase::Running);
        let mut ticker = StatsTicker::new(self.settings.stats_interval, Instant::now());

        let end_reason = loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break EndReason::StopSignal,
                result = self.source.next_frame() => result,
            };

            let frame = match event {
                Ok(FrameEvent::Frame(frame)) => frame,
                Ok(FrameEvent::EndOfStream) => {
                    info!("[Orchestrator] Source reached end ({} frames)", stats.frames);
                    break EndReason::EndOfStream;
                }
                Err(e) => {
                    error!("[Orchestrator] Frame source failed: {}", e);
                    break EndReason::SourceFailed(e.to_string());
                }
            };

            stats.record_frame();
            if self.cadence.on_frame() {
                self.process_frame(&frame, &cache, &mut stats).await;
            }

            if ticker.due(Instant::now()) {
                info!(
                    "Stats - FPS: {:.1}, Total detections: {}",
                    stats.fps(),
                    stats.events
                );
            }
        };

        // ── Draining ──────────────────────────────────────────────────────
        self.enter(Phase::Draining);
        info!("[Orchestrator] Draining ({})", end_reason);

        let archive = match self.session.finalize(chrono::Utc::now().timestamp()) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("[Orchestrator] Final session write failed: {}", e);
                None
            }
        };

        poller_cancel.cancel();
        if let Some(handle) = poller {
            self.join_background("position poller", handle).await;
        }

        self.publisher.disconnect().await;
        self.actuator.release();
        self.source.release().await;

        // ── Stopped ───────────────────────────────────────────────────────
        self.enter(Phase::Stopped);

        let mut summary = RunSummary::from_stats(&stats, capabilities, end_reason);
        summary.archive = archive;
        summary.published = self.publisher.published();
        summary.publish_dropped = self.publisher.dropped();
        summary.session_write_failures = self.session.write_failures();
        summary.log();
        Ok(summary)
    }

    /// Classify one gated frame and fan its results out.
    ///
    /// Nothing in here can end the run: each collaborator failure only
    /// costs that collaborator's contribution for this frame.
    async fn process_frame(&mut self, frame: &Frame, cache: &PositionCache, stats: &mut RunStats) {
        let started = Instant::now();
        let raw = match self.classifier.classify(frame) {
            Ok(detections) => detections,
            Err(e) => {
                stats.classify_failures += 1;
                warn!("[Orchestrator] Classifier failed on frame {}: {}", frame.sequence(), e);
                return;
            }
        };
        let latency = started.elapsed();
        stats.record_inference(latency);

        let detections = self.settings.known_labels.filter(raw);
        self.actuator.apply(&active_labels(&detections));

        if self.settings.display {
            info!(
                "Frame {} | FPS: {:.1} | Inference: {:.1}ms | Detections: {}",
                frame.sequence(),
                stats.fps(),
                latency.as_secs_f64() * 1000.0,
                detections.len()
            );
        }

        if !self.cadence.on_inference() {
            return;
        }
        if detections.is_empty() {
            debug!("[Orchestrator] Sample boundary with no detections");
            return;
        }

        let position = cache.current_position();
        for detection in &detections {
            let event = DetectionEvent::from_detection(detection, position.clone());
            stats.record_event(&event.label);
            if self.settings.display {
                info!("Detected: {}", event);
            }

            if let Err(e) = self.session.append(event.clone()) {
                warn!("[Orchestrator] Session append failed: {}", e);
            }
            self.publisher.publish(&event).await;
        }
    }

    /// Join a background task, aborting it if it overruns the bound.
    async fn join_background<T>(&self, name: &str, mut handle: JoinHandle<T>) {
        match tokio::time::timeout(self.settings.background_join_timeout, &mut handle).await {
            Ok(Ok(_)) => debug!("[Orchestrator] {} stopped", name),
            Ok(Err(e)) => warn!("[Orchestrator] {} ended abnormally: {}", name, e),
            Err(_) => {
                warn!("[Orchestrator] {} did not stop in time, aborting", name);
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}
