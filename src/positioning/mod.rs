//! Positional telemetry: provider contract, sticky cache and poll task
//!
//! The poll task is the only writer of [`PositionCache`]; the frame loop
//! reads snapshots from it and never waits on the task.

use crate::types::Position;
use async_trait::async_trait;
use thiserror::Error;

mod cache;
pub mod nmea;
mod poller;

pub use cache::PositionCache;
pub use nmea::NmeaSerialProvider;
pub use poller::{spawn_position_poller, PollerReport};

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("positioning device unreachable: {0}")]
    Unreachable(String),
}

/// Source of position fixes.
///
/// `connect` is called once at startup; a failure there means the run goes
/// without positions. `poll` absorbs transient failures and returns `None`.
#[async_trait]
pub trait PositionProvider: Send + 'static {
    async fn connect(&mut self) -> Result<(), PositionError>;

    /// One bounded read attempt; `Some` only for a valid fix.
    async fn poll(&mut self) -> Option<Position>;

    async fn close(&mut self) {}

    fn name(&self) -> &str;
}
