//! Frame source abstraction.
//!
//! Provides a unified trait for pulling frames from different sources:
//! recorded frame logs (replay), stdin (the same format piped from a capture
//! helper) and synthetic frames for bench runs.
//!
//! Replay and stdin sources read JSON lines; each non-blank line is one
//! frame and the raw line is its payload.

use crate::types::Frame;
use async_trait::async_trait;
use rand::Rng;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be acquired at startup.
    #[error("frame source unavailable: {0}")]
    Unavailable(String),

    /// The source broke mid-stream.
    #[error("frame source failed: {0}")]
    Failed(String),

    #[error("frame source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Events produced by a frame source.
#[derive(Debug)]
pub enum FrameEvent {
    Frame(Frame),
    /// No more frames will come (EOF, frame budget exhausted).
    EndOfStream,
}

/// Trait abstracting where frames come from.
///
/// The orchestrator calls [`open`](FrameSource::open) once while starting and
/// then [`next_frame`](FrameSource::next_frame) inside a `select!` with
/// cancellation, so implementations may await freely. Any `Err` from
/// `next_frame` ends the run.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Acquire the underlying device or file.
    async fn open(&mut self) -> Result<(), SourceError>;

    /// Pull the next frame. The rate is whatever the source can manage.
    async fn next_frame(&mut self) -> Result<FrameEvent, SourceError>;

    /// Release the device. Called once while draining.
    async fn release(&mut self) {}

    /// Human-readable name for logging (e.g. "replay", "stdin", "synthetic").
    fn source_name(&self) -> &str;
}

/// Read lines until a non-blank one appears. `None` at EOF.
async fn read_frame_line<R>(reader: &mut R, buf: &mut String) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin + Send,
{
    loop {
        buf.clear();
        let bytes = reader.read_line(buf).await?;
        if bytes == 0 {
            return Ok(None);
        }
        let line = buf.trim();
        if !line.is_empty() {
            return Ok(Some(line.as_bytes().to_vec()));
        }
    }
}

/// Sleep between frames, but never before the first one.
async fn pace(interval: Option<Duration>, yielded_first: bool) {
    if let Some(interval) = interval {
        if yielded_first && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
}

// ============================================================================
// Replay Source (recorded frame log)
// ============================================================================

/// Replays a recorded JSON-lines frame log with optional pacing.
pub struct ReplaySource {
    path: PathBuf,
    reader: Option<BufReader<tokio::fs::File>>,
    line_buffer: String,
    frame_interval: Option<Duration>,
    next_sequence: u64,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, frame_interval: Option<Duration>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            line_buffer: String::with_capacity(1024),
            frame_interval,
            next_sequence: 1,
        }
    }
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn open(&mut self) -> Result<(), SourceError> {
        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            SourceError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        self.reader = Some(BufReader::new(file));
        tracing::info!(path = %self.path.display(), "Replay source opened");
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<FrameEvent, SourceError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SourceError::Failed("replay source not opened".to_string()))?;

        pace(self.frame_interval, self.next_sequence > 1).await;

        match read_frame_line(reader, &mut self.line_buffer).await? {
            Some(payload) => {
                let frame = Frame::new(self.next_sequence, payload);
                self.next_sequence += 1;
                Ok(FrameEvent::Frame(frame))
            }
            None => Ok(FrameEvent::EndOfStream),
        }
    }

    async fn release(&mut self) {
        self.reader = None;
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (frame log piped in)
// ============================================================================

/// Reads frames in the replay format from stdin.
///
/// Used with a capture helper:
/// `capture_frames.py | cabai-sentinel --source stdin --model replay`
///
/// Stdin is read on tokio's blocking pool and that read cannot be
/// cancelled. A stop while the pipe is idle leaves it parked; the binary's
/// runtime shutdown is bounded (see [`crate::pipeline::runtime`]), so the
/// process still exits.
pub struct StdinSource {
    reader: Option<BufReader<tokio::io::Stdin>>,
    line_buffer: String,
    next_sequence: u64,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: None,
            line_buffer: String::with_capacity(1024),
            next_sequence: 1,
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for StdinSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        self.reader = Some(BufReader::new(tokio::io::stdin()));
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<FrameEvent, SourceError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SourceError::Failed("stdin source not opened".to_string()))?;

        match read_frame_line(reader, &mut self.line_buffer).await? {
            Some(payload) => {
                let frame = Frame::new(self.next_sequence, payload);
                self.next_sequence += 1;
                Ok(FrameEvent::Frame(frame))
            }
            None => Ok(FrameEvent::EndOfStream),
        }
    }

    async fn release(&mut self) {
        self.reader = None;
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Synthetic Source (bench runs)
// ============================================================================

/// Default synthetic payload size in bytes.
const SYNTHETIC_FRAME_BYTES: usize = 1024;

/// Produces random payloads, optionally capped at a frame count.
pub struct SyntheticSource {
    limit: Option<u64>,
    frame_interval: Option<Duration>,
    frame_bytes: usize,
    next_sequence: u64,
}

impl SyntheticSource {
    pub fn new(limit: Option<u64>, frame_interval: Option<Duration>) -> Self {
        Self {
            limit,
            frame_interval,
            frame_bytes: SYNTHETIC_FRAME_BYTES,
            next_sequence: 1,
        }
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn open(&mut self) -> Result<(), SourceError> {
        tracing::info!(limit = ?self.limit, "Synthetic source ready");
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<FrameEvent, SourceError> {
        if let Some(limit) = self.limit {
            if self.next_sequence > limit {
                return Ok(FrameEvent::EndOfStream);
            }
        }

        pace(self.frame_interval, self.next_sequence > 1).await;

        let mut data = vec![0u8; self.frame_bytes];
        rand::thread_rng().fill(&mut data[..]);
        let frame = Frame::new(self.next_sequence, data);
        self.next_sequence += 1;
        Ok(FrameEvent::Frame(frame))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}

// ============================================================================
// Source selection
// ============================================================================

/// `--source` selector: `replay:<path>`, `stdin`, `synthetic` or `synthetic:<frames>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Replay(PathBuf),
    Stdin,
    Synthetic(Option<u64>),
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((k, a)) => (k, Some(a)),
            None => (s, None),
        };
        match (kind, arg) {
            ("replay", Some(path)) if !path.is_empty() => Ok(Self::Replay(PathBuf::from(path))),
            ("replay", _) => Err("replay source needs a path: replay:<file>".to_string()),
            ("stdin", None) => Ok(Self::Stdin),
            ("synthetic", None) => Ok(Self::Synthetic(None)),
            ("synthetic", Some(n)) => n
                .parse::<u64>()
                .map(|n| Self::Synthetic(Some(n)))
                .map_err(|_| format!("invalid synthetic frame count '{n}'")),
            _ => Err(format!(
                "unknown source '{s}' (expected replay:<file>, stdin, synthetic[:<frames>])"
            )),
        }
    }
}

impl SourceSpec {
    /// Build the source. `fps` paces replay and synthetic sources; stdin is
    /// paced by whoever writes to it.
    pub fn build(&self, fps: Option<f64>) -> Box<dyn FrameSource> {
        let interval = fps
            .filter(|f| f.is_finite() && *f > 0.0)
            .and_then(|f| Duration::try_from_secs_f64(1.0 / f).ok());
        match self {
            Self::Replay(path) => Box::new(ReplaySource::new(path.clone(), interval)),
            Self::Stdin => Box::new(StdinSource::new()),
            Self::Synthetic(limit) => Box::new(SyntheticSource::new(*limit, interval)),
        }
    }
}
