//! Agent runtime orchestration.

use crate::config::{AgentConfig, PublisherKind};
use crate::publisher::{AgentPublisher, LogPublisher};
use crate::scheduler::{run_adapter, RunOutcome, RunReport};
use anyhow::{Context, Result};
use simple_counter_core::SimpleCounterAdapter;
use simple_counter_mqtt::{spawn_event_loop, MqttPublisher};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// The main agent runtime.
pub struct Agent {
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Run every configured adapter until Ctrl+C or until all of them have
    /// finished.
    ///
    /// # Errors
    ///
    /// Returns error if the publisher cannot be created.
    pub async fn run(self) -> Result<()> {
        tracing::info!(adapters = self.config.adapters.len(), "Starting agent runtime");

        let (publisher, event_loop) = match self.config.publisher.kind {
            PublisherKind::Mqtt => {
                let (publisher, eventloop) = MqttPublisher::new(&self.config.publisher.mqtt)
                    .context("Failed to create MQTT publisher")?;
                tracing::info!(
                    broker = %self.config.publisher.mqtt.mqtt_broker,
                    client_id = %self.config.publisher.mqtt.client_id,
                    "Publishing to MQTT"
                );
                (AgentPublisher::Mqtt(publisher), Some(spawn_event_loop(eventloop)))
            }
            PublisherKind::Log => {
                tracing::info!("Publishing to log only");
                (AgentPublisher::Log(LogPublisher), None)
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for adapter_config in self.config.adapters {
            let adapter = SimpleCounterAdapter::new(adapter_config, publisher.clone());
            tasks.spawn(run_adapter(adapter, shutdown_rx.clone()));
        }

        tracing::info!("Agent running, press Ctrl+C to stop");

        loop {
            tokio::select! {
                joined = tasks.join_next() => {
                    match joined {
                        Some(result) => log_report(result),
                        None => {
                            tracing::info!("All adapters finished");
                            break;
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                    // Receivers are held by the adapter tasks, which are still running.
                    let _ = shutdown_tx.send(true);
                    break;
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            log_report(result);
        }

        shutdown_publisher(&publisher, event_loop).await;

        tracing::info!("Agent stopped");
        Ok(())
    }
}

fn log_report(result: Result<RunReport, JoinError>) {
    match result {
        Ok(report) => match report.outcome {
            RunOutcome::Removed => tracing::warn!(
                adapter_id = %report.adapter_id,
                polls = report.polls,
                failures = report.failures,
                "Adapter removed after exhausting its error budget"
            ),
            RunOutcome::StartFailed => tracing::error!(
                adapter_id = %report.adapter_id,
                "Adapter never started"
            ),
            RunOutcome::Stopped => tracing::info!(
                adapter_id = %report.adapter_id,
                polls = report.polls,
                failures = report.failures,
                "Adapter stopped"
            ),
        },
        Err(err) => tracing::error!(error = %err, "Adapter task failed"),
    }
}

async fn shutdown_publisher(publisher: &AgentPublisher, event_loop: Option<JoinHandle<()>>) {
    if let AgentPublisher::Mqtt(mqtt) = publisher {
        if let Err(err) = mqtt.disconnect().await {
            tracing::warn!(error = %err, "MQTT disconnect failed");
        }
    }

    if let Some(handle) = event_loop {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            tracing::warn!("MQTT event loop did not stop in time");
        }
    }
}
