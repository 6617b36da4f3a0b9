//! Agent configuration.

use anyhow::{bail, Context, Result};
use simple_counter_core::{load_adapter_configs, AdapterConfig, RawAdapterConfig};
use simple_counter_mqtt::{qos_from_level, MqttPublisherConfig};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Where samples are published
    pub publisher: PublisherConfig,

    /// Adapters to run, one instance each
    pub adapters: Vec<AdapterConfig>,
}

/// Publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Publisher type
    pub kind: PublisherKind,

    /// MQTT settings (for [`PublisherKind::Mqtt`])
    pub mqtt: MqttPublisherConfig,
}

/// Available publisher types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherKind {
    /// Publish to an MQTT broker
    Mqtt,
    /// Log samples instead of publishing them
    Log,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            publisher: PublisherConfig {
                kind: PublisherKind::Mqtt,
                mqtt: MqttPublisherConfig {
                    client_id: format!("simple-counter-{}", Uuid::new_v4()),
                    ..MqttPublisherConfig::default()
                },
            },
            adapters: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIMPLE_COUNTER_PUBLISHER`: "mqtt" or "log"
    /// - `SIMPLE_COUNTER_MQTT_BROKER`: MQTT broker URL
    /// - `SIMPLE_COUNTER_CLIENT_ID`: MQTT client ID
    /// - `SIMPLE_COUNTER_QOS`: 0, 1 or 2
    /// - `SIMPLE_COUNTER_RETAIN`: "true" or "false"
    /// - `SIMPLE_COUNTER_PUBLISH_TIMEOUT_MS`: publish deadline
    /// - `SIMPLE_COUNTER_ADAPTERS`: JSON array of adapter configurations
    /// - `SIMPLE_COUNTER_ADAPTERS_FILE`: file holding the same JSON array
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(kind) = lookup("SIMPLE_COUNTER_PUBLISHER") {
            config.publisher.kind = match kind.to_ascii_lowercase().as_str() {
                "mqtt" => PublisherKind::Mqtt,
                "log" => PublisherKind::Log,
                other => bail!("Invalid SIMPLE_COUNTER_PUBLISHER '{other}', expected 'mqtt' or 'log'"),
            };
        }

        if let Some(broker) = lookup("SIMPLE_COUNTER_MQTT_BROKER") {
            config.publisher.mqtt.mqtt_broker = broker;
        }

        if let Some(client_id) = lookup("SIMPLE_COUNTER_CLIENT_ID") {
            config.publisher.mqtt.client_id = client_id;
        }

        if let Some(qos) = lookup("SIMPLE_COUNTER_QOS") {
            let level: u8 = qos.parse().context("Invalid SIMPLE_COUNTER_QOS")?;
            config.publisher.mqtt.qos = qos_from_level(level)?;
        }

        if let Some(retain) = lookup("SIMPLE_COUNTER_RETAIN") {
            config.publisher.mqtt.retain = retain.parse().context("Invalid SIMPLE_COUNTER_RETAIN")?;
        }

        if let Some(timeout) = lookup("SIMPLE_COUNTER_PUBLISH_TIMEOUT_MS") {
            let millis: u64 = timeout
                .parse()
                .context("Invalid SIMPLE_COUNTER_PUBLISH_TIMEOUT_MS")?;
            config.publisher.mqtt.publish_timeout = Duration::from_millis(millis);
        }

        config.adapters = if let Some(json) = lookup("SIMPLE_COUNTER_ADAPTERS") {
            load_adapter_configs(&json).context("Invalid SIMPLE_COUNTER_ADAPTERS")?
        } else if let Some(path) = lookup("SIMPLE_COUNTER_ADAPTERS_FILE") {
            let path = PathBuf::from(path);
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            load_adapter_configs(&json)
                .with_context(|| format!("Invalid adapter configuration in {}", path.display()))?
        } else {
            vec![RawAdapterConfig::new("simple-counter").validate()?]
        };

        if config.adapters.is_empty() {
            bail!("No adapters configured");
        }

        Ok(config)
    }
}
