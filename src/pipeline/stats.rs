//! Run counters and the end-of-run summary.
//!
//! Observability only: nothing here feeds back into cadence decisions.

use super::orchestrator::Capabilities;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

const BANNER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Why the frame loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    EndOfStream,
    StopSignal,
    /// The source broke mid-stream; the run still drains normally.
    SourceFailed(String),
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::EndOfStream => write!(f, "end of stream"),
            EndReason::StopSignal => write!(f, "stop signal"),
            EndReason::SourceFailed(e) => write!(f, "source failed ({e})"),
        }
    }
}

/// Running counters owned by the frame loop.
#[derive(Debug)]
pub struct RunStats {
    started: Instant,
    pub frames: u64,
    pub inferences: u64,
    pub classify_failures: u64,
    pub events: u64,
    pub per_label: BTreeMap<String, u64>,
    total_inference_time: Duration,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            frames: 0,
            inferences: 0,
            classify_failures: 0,
            events: 0,
            per_label: BTreeMap::new(),
            total_inference_time: Duration::ZERO,
        }
    }

    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    pub fn record_inference(&mut self, latency: Duration) {
        self.inferences += 1;
        self.total_inference_time += latency;
    }

    pub fn record_event(&mut self, label: &str) {
        self.events += 1;
        *self.per_label.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Frames pulled per second since the run started.
    pub fn fps(&self) -> f64 {
        rate(self.frames, self.elapsed())
    }

    pub fn mean_inference_ms(&self) -> f64 {
        if self.inferences == 0 {
            0.0
        } else {
            self.total_inference_time.as_secs_f64() * 1000.0 / self.inferences as f64
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Wall-clock trigger for the periodic stats line.
#[derive(Debug)]
pub struct StatsTicker {
    interval: Duration,
    /// `None` when the interval reaches past what `Instant` can represent.
    next_due: Option<Instant>,
}

impl StatsTicker {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now.checked_add(interval),
        }
    }

    /// True at most once per interval; late checks do not fire twice.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(next_due) if now >= next_due => {
                self.next_due = now.checked_add(self.interval);
                true
            }
            _ => false,
        }
    }
}

/// What the caller gets back once the run is `Stopped`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames: u64,
    pub inferences: u64,
    pub classify_failures: u64,
    pub events: u64,
    pub elapsed: Duration,
    pub per_label: BTreeMap<String, u64>,
    pub capabilities: Capabilities,
    pub end_reason: EndReason,
    pub archive: Option<PathBuf>,
    pub published: u64,
    pub publish_dropped: u64,
    pub session_write_failures: u64,
}

impl RunSummary {
    pub fn from_stats(stats: &RunStats, capabilities: Capabilities, end_reason: EndReason) -> Self {
        Self {
            frames: stats.frames,
            inferences: stats.inferences,
            classify_failures: stats.classify_failures,
            events: stats.events,
            elapsed: stats.elapsed(),
            per_label: stats.per_label.clone(),
            capabilities,
            end_reason,
            archive: None,
            published: 0,
            publish_dropped: 0,
            session_write_failures: 0,
        }
    }

    pub fn average_fps(&self) -> f64 {
        rate(self.frames, self.elapsed)
    }

    pub fn log(&self) {
        info!("");
        info!("{BANNER}");
        info!("📊 FINAL STATISTICS");
        info!("{BANNER}");
        info!("   Stopped by:           {}", self.end_reason);
        info!("   Frames:               {}", self.frames);
        info!("   Inferences:           {}", self.inferences);
        if self.classify_failures > 0 {
            info!("   Classifier failures:  {}", self.classify_failures);
        }
        info!("   Elapsed:              {:.1}s", self.elapsed.as_secs_f64());
        info!("   Average FPS:          {:.1}", self.average_fps());
        info!("   Detection events:     {}", self.events);
        for (label, count) in &self.per_label {
            info!("     {:<20} {}", label, count);
        }
        if self.capabilities.telemetry {
            info!(
                "   Published:            {} ({} dropped)",
                self.published, self.publish_dropped
            );
        }
        if self.session_write_failures > 0 {
            info!("   Session write errors: {}", self.session_write_failures);
        }
        if let Some(ref path) = self.archive {
            info!("   Archive:              {}", path.display());
        }
        info!("{BANNER}");
    }
}
