//! Publisher selection for the agent.

use simple_counter_core::{DataPointBatch, PublishError, Publisher};
use simple_counter_mqtt::MqttPublisher;
use std::future::Future;

/// Publisher chosen at startup, shared by every adapter.
#[derive(Debug, Clone)]
pub enum AgentPublisher {
    /// Publish to an MQTT broker
    Mqtt(MqttPublisher),
    /// Log samples only
    Log(LogPublisher),
}

impl Publisher for AgentPublisher {
    async fn publish(&self, topic: &str, batch: &DataPointBatch) -> Result<(), PublishError> {
        match self {
            Self::Mqtt(publisher) => publisher.publish(topic, batch).await,
            Self::Log(publisher) => publisher.publish(topic, batch).await,
        }
    }

    fn validate_destination(&self, topic: &str) -> Result<(), PublishError> {
        match self {
            Self::Mqtt(publisher) => publisher.validate_destination(topic),
            Self::Log(publisher) => publisher.validate_destination(topic),
        }
    }
}

/// Writes every batch to the log instead of a broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(
        &self,
        topic: &str,
        batch: &DataPointBatch,
    ) -> impl Future<Output = Result<(), PublishError>> + Send {
        let data_points = batch
            .data_points
            .iter()
            .map(|point| format!("{}={}", point.name, point.value))
            .collect::<Vec<_>>()
            .join(",");

        tracing::info!(
            topic,
            adapter_id = %batch.adapter_id,
            sampled_at = %batch.sampled_at,
            data_points,
            "Sample"
        );

        std::future::ready(Ok(()))
    }
}
