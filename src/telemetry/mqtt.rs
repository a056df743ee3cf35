//! MQTT transport backed by rumqttc.
//!
//! rumqttc reconnects when its event loop is polled again after an error.
//! The driver task stops polling at the first error, so a dropped broker
//! connection stays dropped for the rest of the run.

use super::{PubSubTransport, TransportError};
use crate::config::{defaults, TelemetryConfig};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bound on flushing DISCONNECT and joining the driver task.
pub(crate) const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `eventloop` until a queued DISCONNECT has been written, the
/// connection fails or `timeout` passes. Returns whether it went out.
pub(crate) async fn flush_disconnect(eventloop: &mut EventLoop, timeout: Duration) -> bool {
    let flushed = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Connection ended before DISCONNECT was sent");
                    return false;
                }
            }
        }
    };
    tokio::time::timeout(timeout, flushed).await.unwrap_or(false)
}

pub struct MqttTransport {
    endpoint: String,
    options: Option<MqttOptions>,
    connect_timeout: Duration,
    client: Option<AsyncClient>,
    driver: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl MqttTransport {
    pub fn new(config: &TelemetryConfig) -> Self {
        let client_id = format!(
            "{}_{}",
            config.client_id_prefix,
            chrono::Utc::now().timestamp()
        );
        let mut options = MqttOptions::new(client_id, config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        Self {
            endpoint: format!("{}:{}", config.broker, config.port),
            options: Some(options),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            client: None,
            driver: None,
            connected: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    async fn await_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(TransportError::Connect(format!("{:?}", ack.code)))
                    };
                }
                Ok(_) => {}
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }
    }

    fn spawn_driver(
        mut eventloop: EventLoop,
        connected: Arc<AtomicBool>,
        cancel: CancellationToken,
        endpoint: String,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = eventloop.poll() => event,
                };
                match event {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(Event::Incoming(Packet::PubAck(ack))) => {
                        debug!(pkid = ack.pkid, "[MqttTransport] PUBACK");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            endpoint = %endpoint,
                            error = %e,
                            "[MqttTransport] Connection lost; not reconnecting"
                        );
                        break;
                    }
                }
            }
            connected.store(false, Ordering::Release);
        })
    }
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let options = self
            .options
            .take()
            .ok_or_else(|| TransportError::Connect("connect called twice".to_string()))?;

        let (client, mut eventloop) =
            AsyncClient::new(options, defaults::MQTT_REQUEST_CHANNEL_CAPACITY);

        let connack = Self::await_connack(&mut eventloop);
        match tokio::time::timeout(self.connect_timeout, connack).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(TransportError::ConnectTimeout(self.connect_timeout)),
        }

        self.connected.store(true, Ordering::Release);
        self.driver = Some(Self::spawn_driver(
            eventloop,
            Arc::clone(&self.connected),
            self.cancel.clone(),
            self.endpoint.clone(),
        ));
        self.client = Some(client);
        info!(endpoint = %self.endpoint, "[MqttTransport] Connected");
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::Disconnected)?;
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::Disconnected);
        }
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if self.connected.load(Ordering::Acquire) {
                if let Err(e) = client.try_disconnect() {
                    debug!(error = %e, "[MqttTransport] DISCONNECT not queued");
                }
            }
        }

        if let Some(mut driver) = self.driver.take() {
            if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut driver).await.is_err() {
                self.cancel.cancel();
                let _ = driver.await;
            }
        }
        self.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}
