//! MQTT publisher for data point batches.

use crate::topic::validate_topic_name;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use simple_counter_core::{DataPointBatch, PublishError, Publisher};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Configuration for the MQTT publisher.
#[derive(Debug, Clone)]
pub struct MqttPublisherConfig {
    /// MQTT broker URL (e.g., <tcp://localhost:1883>)
    pub mqtt_broker: String,
    /// Client ID for the MQTT connection
    pub client_id: String,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Quality of service for published samples
    pub qos: QoS,
    /// Ask the broker to retain the last sample per topic
    pub retain: bool,
    /// Deadline for handing a publish to the client
    pub publish_timeout: Duration,
    /// Capacity of the client's request queue
    pub request_capacity: usize,
}

impl Default for MqttPublisherConfig {
    fn default() -> Self {
        Self {
            mqtt_broker: "tcp://localhost:1883".to_string(),
            client_id: "simple-counter".to_string(),
            keep_alive: Duration::from_secs(30),
            qos: QoS::AtMostOnce,
            retain: false,
            publish_timeout: Duration::from_secs(5),
            request_capacity: 100,
        }
    }
}

/// Publishes batches as JSON documents over MQTT.
///
/// Cloning is cheap and every clone shares the same connection, so one
/// publisher can be handed to many adapters.
#[derive(Debug, Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
    retain: bool,
    publish_timeout: Duration,
}

impl MqttPublisher {
    /// Create a new MQTT publisher.
    ///
    /// Nothing is sent until the returned event loop is polled, see
    /// [`spawn_event_loop`].
    ///
    /// # Errors
    ///
    /// Returns error if the broker URL is invalid.
    pub fn new(config: &MqttPublisherConfig) -> Result<(Self, EventLoop), MqttError> {
        let (host, port) = parse_mqtt_url(&config.mqtt_broker)?;

        let mut mqtt_options = MqttOptions::new(&config.client_id, host, port);
        mqtt_options.set_keep_alive(config.keep_alive);

        let (client, eventloop) = AsyncClient::new(mqtt_options, config.request_capacity);

        Ok((
            Self {
                client,
                qos: config.qos,
                retain: config.retain,
                publish_timeout: config.publish_timeout,
            },
            eventloop,
        ))
    }

    /// Disconnect from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::Disconnect(e.to_string()))
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, batch: &DataPointBatch) -> Result<(), PublishError> {
        let payload = batch
            .to_json()
            .map_err(|e| PublishError::Encode(e.to_string()))?;
        let payload_len = payload.len();

        tokio::time::timeout(
            self.publish_timeout,
            self.client.publish(topic, self.qos, self.retain, payload),
        )
        .await
        .map_err(|_| PublishError::Timeout(self.publish_timeout))?
        .map_err(|e| PublishError::Transport(e.to_string()))?;

        tracing::debug!(topic, payload_len, "Published batch");

        Ok(())
    }

    fn validate_destination(&self, topic: &str) -> Result<(), PublishError> {
        validate_topic_name(topic).map_err(|e| PublishError::InvalidTopic(e.to_string()))
    }
}

/// Drive the client's event loop until the client disconnects.
///
/// Connection errors are logged and retried after a delay; the event loop
/// reconnects on the next poll.
#[must_use]
pub fn spawn_event_loop(mut eventloop: EventLoop) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("Connected to MQTT broker");
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    tracing::trace!(pkid = ack.pkid, "Publish acknowledged");
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    tracing::info!("Disconnected from MQTT broker");
                    break;
                }
                Ok(_) => {}
                Err(ConnectionError::RequestsDone) => {
                    tracing::debug!("MQTT request channel closed, stopping event loop");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "MQTT error");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    })
}

/// Map a numeric QoS level onto [`QoS`].
///
/// # Errors
///
/// Returns error for anything other than 0, 1 or 2.
pub fn qos_from_level(level: u8) -> Result<QoS, MqttError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttError::InvalidQos(other)),
    }
}

/// Parse MQTT URL into host and port.
fn parse_mqtt_url(input: &str) -> Result<(String, u16), MqttError> {
    if input.contains("://") {
        let url =
            Url::parse(input).map_err(|e| MqttError::InvalidBrokerUrl(format!("{input}: {e}")))?;

        match url.scheme() {
            "tcp" | "mqtt" => {}
            scheme => {
                return Err(MqttError::InvalidBrokerUrl(format!(
                    "{input}: unsupported scheme '{scheme}'"
                )));
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| MqttError::InvalidBrokerUrl(format!("{input}: missing host")))?;
        let port = url.port().unwrap_or(1883);

        return Ok((host.to_string(), port));
    }

    let mut parts = input.split(':');
    let host = parts
        .next()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| MqttError::InvalidBrokerUrl(format!("{input}: missing host")))?;
    let port = match parts.next() {
        None => 1883,
        Some(port) => port.parse().map_err(|_| {
            MqttError::InvalidBrokerUrl(format!("{input}: invalid port '{port}'"))
        })?,
    };
    if parts.next().is_some() {
        return Err(MqttError::InvalidBrokerUrl(format!(
            "{input}: too many ':' separators"
        )));
    }

    Ok((host.to_string(), port))
}

/// Errors raised while setting up the MQTT publisher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MqttError {
    /// Invalid MQTT broker URL
    #[error("invalid MQTT broker URL: {0}")]
    InvalidBrokerUrl(String),
    /// QoS level outside 0..=2
    #[error("invalid QoS level: {0}")]
    InvalidQos(u8),
    /// Disconnect request failed
    #[error("disconnect error: {0}")]
    Disconnect(String),
}
