//! Detection telemetry over pub/sub
//!
//! - `publisher`: best-effort, at-most-once event publishing for the frame loop
//! - `mqtt`: rumqttc-backed transport
//! - `monitor`: topic subscriber used by the `monitor` subcommand

use async_trait::async_trait;
use thiserror::Error;

pub mod monitor;
mod mqtt;
mod publisher;

pub use mqtt::MqttTransport;
pub use publisher::TelemetryPublisher;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("broker connection failed: {0}")]
    Connect(String),

    #[error("broker did not acknowledge the connection within {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("transport is not connected")]
    Disconnected,

    #[error("publish failed: {0}")]
    Publish(String),
}

/// Connection to a pub/sub broker.
///
/// Connected once at startup. Implementations do not reconnect: after a
/// mid-run drop, `is_connected` stays false for the rest of the run.
#[async_trait]
pub trait PubSubTransport: Send + 'static {
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Endpoint description for logs.
    fn name(&self) -> &str;
}
