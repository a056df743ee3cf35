//! Fire-and-forget event publishing.

use super::PubSubTransport;
use crate::types::DetectionEvent;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Publishes sampled events without ever failing or stalling the caller.
///
/// Each event gets one attempt bounded by `timeout`. Failures are logged and
/// counted as dropped; nothing is queued or retried.
pub struct TelemetryPublisher {
    transport: Option<Box<dyn PubSubTransport>>,
    topic: String,
    timeout: Duration,
    published: u64,
    dropped: u64,
    disconnect_reported: bool,
}

impl TelemetryPublisher {
    pub fn new(
        transport: Option<Box<dyn PubSubTransport>>,
        topic: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            topic: topic.into(),
            timeout,
            published: 0,
            dropped: 0,
            disconnect_reported: false,
        }
    }

    /// A publisher that does nothing.
    pub fn disabled() -> Self {
        Self::new(None, String::new(), Duration::ZERO)
    }

    /// Connect the transport. On failure the transport is dropped and the
    /// run continues without telemetry.
    pub async fn connect(&mut self) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        match transport.connect().await {
            Ok(()) => {
                info!(endpoint = transport.name(), topic = %self.topic, "Telemetry connected");
                true
            }
            Err(e) => {
                warn!(endpoint = transport.name(), error = %e, "Telemetry unavailable, continuing without publishing");
                self.transport = None;
                false
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn publish(&mut self, event: &DetectionEvent) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        if !transport.is_connected() {
            if !self.disconnect_reported {
                warn!(
                    endpoint = transport.name(),
                    "Telemetry connection lost; events will not be published for the rest of this run"
                );
                self.disconnect_reported = true;
            }
            self.dropped += 1;
            return;
        }

        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to encode event for telemetry");
                self.dropped += 1;
                return;
            }
        };

        match tokio::time::timeout(self.timeout, transport.publish(&self.topic, payload)).await {
            Ok(Ok(())) => {
                self.published += 1;
                debug!(label = %event.label, "Event published");
            }
            Ok(Err(e)) => {
                self.dropped += 1;
                warn!(label = %event.label, error = %e, "Publish failed, event dropped");
            }
            Err(_) => {
                self.dropped += 1;
                warn!(
                    label = %event.label,
                    "Publish timed out after {}ms, event dropped",
                    self.timeout.as_millis()
                );
            }
        }
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect().await;
            info!(endpoint = transport.name(), "Telemetry disconnected");
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
