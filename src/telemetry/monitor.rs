//! Topic monitor: prints every detection event published on the telemetry topic.

use super::mqtt::{flush_disconnect, DISCONNECT_TIMEOUT};
use super::TransportError;
use crate::config::defaults;
use crate::types::DetectionEvent;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Pause before the event loop is polled again after a connection error.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where to listen.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub broker: String,
    pub port: u16,
    pub topic: String,
    pub client_id_prefix: String,
    pub keep_alive: Duration,
}

/// One console line per received message.
///
/// Decodable events become `[YYYY-mm-dd HH:MM:SS] class - Confidence: 0.87`
/// (plus the location when present); anything else is shown raw.
pub fn format_message(payload: &[u8]) -> String {
    match serde_json::from_slice::<DetectionEvent>(payload) {
        Ok(event) => {
            let mut line = format!(
                "[{}] {} - Confidence: {:.2}",
                event.captured_at.format("%Y-%m-%d %H:%M:%S"),
                event.label,
                event.confidence
            );
            if let Some(pos) = event.position {
                line.push_str(&format!(" @ {pos}"));
            }
            line
        }
        Err(_) => String::from_utf8_lossy(payload).into_owned(),
    }
}

/// Subscribe and log messages until `cancel` fires. Returns the message count.
///
/// Unlike the detector's transport, the monitor keeps polling after
/// connection errors, so it rides out broker restarts.
pub async fn run_monitor(
    options: MonitorOptions,
    cancel: CancellationToken,
) -> Result<u64, TransportError> {
    let client_id = format!(
        "{}_monitor_{}",
        options.client_id_prefix,
        chrono::Utc::now().timestamp()
    );
    let mut mqtt = MqttOptions::new(client_id, options.broker.clone(), options.port);
    mqtt.set_keep_alive(options.keep_alive);

    let (client, mut eventloop) = AsyncClient::new(mqtt, defaults::MQTT_REQUEST_CHANNEL_CAPACITY);
    let mut received: u64 = 0;
    let mut connected = false;

    info!(
        "📡 Monitoring {}:{} topic '{}' (Ctrl+C to stop)",
        options.broker, options.port, options.topic
    );

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected = true;
                client
                    .subscribe(options.topic.clone(), QoS::AtLeastOnce)
                    .await
                    .map_err(|e| TransportError::Connect(e.to_string()))?;
                info!(topic = %options.topic, "Subscribed");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                received += 1;
                info!("{}", format_message(&publish.payload));
            }
            Ok(_) => {}
            Err(e) => {
                connected = false;
                warn!(error = %e, "Broker connection error, retrying");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    if connected {
        match client.try_disconnect() {
            Ok(()) => {
                flush_disconnect(&mut eventloop, DISCONNECT_TIMEOUT).await;
            }
            Err(e) => tracing::debug!(error = %e, "DISCONNECT not queued"),
        }
    }
    info!("Monitor stopped ({} messages)", received);
    Ok(received)
}
