//! Polling adapter lifecycle.
//!
//! A scheduler drives an adapter through [`PollingAdapter`]: `start` once,
//! `poll` repeatedly at no less than [`PollingAdapter::polling_interval`],
//! then `stop` exactly once. Calls on one instance are strictly sequential,
//! which the `&mut self` receivers enforce; separate instances share nothing.

use crate::budget::ErrorBudget;
use crate::config::AdapterConfig;
use crate::datapoint::DataPointBatch;
use crate::publisher::{PublishError, Publisher};
use crate::state::{ConnectionStatus, Lifecycle};
use std::future::Future;
use std::time::Duration;

/// Name of the data point carrying the counter value.
pub const COUNTER_DATA_POINT: &str = "counter";

/// Why an adapter is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Regular shutdown
    Shutdown,
    /// Consecutive failed polls reached the error budget
    ErrorBudgetExhausted,
}

/// Scheduler-facing interface of a polling adapter.
pub trait PollingAdapter: Send {
    /// Adapter identifier.
    fn id(&self) -> &str;

    /// Minimum time between two polls.
    fn polling_interval(&self) -> Duration;

    /// Consecutive failed polls that trigger removal.
    fn max_polling_errors_before_removal(&self) -> u32;

    /// Failed polls since the last successful one.
    fn consecutive_errors(&self) -> u32;

    /// Current connection status.
    fn connection_status(&self) -> ConnectionStatus;

    /// Current lifecycle state.
    fn lifecycle(&self) -> Lifecycle;

    /// Prepare the adapter for polling.
    fn start(&mut self) -> impl Future<Output = Result<ConnectionStatus, StartError>> + Send;

    /// Run one poll cycle.
    ///
    /// Every call resolves, successfully or not, so the scheduler can
    /// schedule the next cycle or apply the error budget.
    fn poll(&mut self) -> impl Future<Output = Result<DataPointBatch, PollError>> + Send;

    /// Stop the adapter for the given reason.
    fn stop_with(
        &mut self,
        reason: StopReason,
    ) -> impl Future<Output = Result<(), StopError>> + Send;

    /// Stop the adapter for a regular shutdown.
    fn stop(&mut self) -> impl Future<Output = Result<(), StopError>> + Send {
        self.stop_with(StopReason::Shutdown)
    }

    /// Error budget derived from [`Self::max_polling_errors_before_removal`].
    fn error_budget(&self) -> ErrorBudget {
        ErrorBudget::new(self.max_polling_errors_before_removal())
    }
}

/// Adapter exposing a single counter that advances by one on every
/// successful poll.
#[derive(Debug)]
pub struct SimpleCounterAdapter<P> {
    config: AdapterConfig,
    publisher: P,
    lifecycle: Lifecycle,
    status: ConnectionStatus,
    current_value: u64,
    consecutive_errors: u32,
}

impl<P: Publisher> SimpleCounterAdapter<P> {
    /// Create an adapter publishing through `publisher`.
    #[must_use]
    pub fn new(config: AdapterConfig, publisher: P) -> Self {
        let current_value = config.initial_counter_value();
        Self {
            config,
            publisher,
            lifecycle: Lifecycle::Created,
            status: ConnectionStatus::Uninitialized,
            current_value,
            consecutive_errors: 0,
        }
    }

    /// Configuration this adapter was built from.
    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Last successfully published counter value.
    #[must_use]
    pub fn current_value(&self) -> u64 {
        self.current_value
    }

    fn record_failure(&mut self, error: PollError) -> PollError {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.status = ConnectionStatus::Error;

        tracing::warn!(
            adapter_id = %self.config.id(),
            consecutive_errors = self.consecutive_errors,
            max_errors = self.config.max_polling_errors_before_removal(),
            error = %error,
            "Poll failed"
        );

        error
    }
}

impl<P: Publisher> PollingAdapter for SimpleCounterAdapter<P> {
    fn id(&self) -> &str {
        self.config.id()
    }

    fn polling_interval(&self) -> Duration {
        self.config.polling_interval()
    }

    fn max_polling_errors_before_removal(&self) -> u32 {
        self.config.max_polling_errors_before_removal()
    }

    fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.status
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    async fn start(&mut self) -> Result<ConnectionStatus, StartError> {
        if self.lifecycle != Lifecycle::Created {
            return Err(StartError::InvalidState(self.lifecycle));
        }
        self.lifecycle = Lifecycle::Starting;

        // Left in `Starting` on failure so the scheduler can still stop it.
        if let Err(err) = self
            .publisher
            .validate_destination(self.config.destination_topic())
        {
            self.status = ConnectionStatus::Error;
            tracing::error!(
                adapter_id = %self.config.id(),
                topic = %self.config.destination_topic(),
                error = %err,
                "Adapter failed to start"
            );
            return Err(StartError::Destination(err));
        }

        self.current_value = self.config.initial_counter_value();
        self.consecutive_errors = 0;
        self.status = ConnectionStatus::Stateless;
        self.lifecycle = Lifecycle::Running;

        tracing::info!(
            adapter_id = %self.config.id(),
            initial_value = self.current_value,
            topic = %self.config.destination_topic(),
            interval_ms = self.config.polling_interval_millis(),
            "Adapter started"
        );

        Ok(self.status)
    }

    async fn poll(&mut self) -> Result<DataPointBatch, PollError> {
        if self.lifecycle != Lifecycle::Running {
            return Err(PollError::NotRunning(self.lifecycle));
        }
        if self.error_budget().is_exhausted(self.consecutive_errors) {
            return Err(PollError::ErrorBudgetExhausted(self.consecutive_errors));
        }

        let Some(next) = self.current_value.checked_add(1) else {
            return Err(self.record_failure(PollError::CounterOverflow));
        };

        let mut batch = DataPointBatch::new(self.config.id());
        batch.add_data_point(COUNTER_DATA_POINT, next);

        let published = self
            .publisher
            .publish(self.config.destination_topic(), &batch)
            .await;

        match published {
            Ok(()) => {
                self.current_value = next;
                self.consecutive_errors = 0;

                tracing::debug!(
                    adapter_id = %self.config.id(),
                    value = next,
                    "Published counter value"
                );

                Ok(batch)
            }
            Err(err) => {
                if self.config.advance_counter_on_publish_failure() {
                    self.current_value = next;
                }
                Err(self.record_failure(PollError::Publish(err)))
            }
        }
    }

    async fn stop_with(&mut self, reason: StopReason) -> Result<(), StopError> {
        if self.lifecycle.is_terminal() {
            return Ok(());
        }

        let was_running = self.lifecycle == Lifecycle::Running;
        let was_started = was_running || self.lifecycle == Lifecycle::Starting;
        self.lifecycle = Lifecycle::Stopping;

        let result = if was_started {
            self.publisher
                .release(self.config.destination_topic())
                .await
                .map_err(StopError::Release)
        } else {
            Ok(())
        };

        self.status = ConnectionStatus::Disconnected;
        self.lifecycle = if was_running && reason == StopReason::ErrorBudgetExhausted {
            Lifecycle::Removed
        } else {
            Lifecycle::Stopped
        };

        match &result {
            Ok(()) => tracing::info!(
                adapter_id = %self.config.id(),
                state = %self.lifecycle,
                last_value = self.current_value,
                "Adapter stopped"
            ),
            Err(err) => tracing::warn!(
                adapter_id = %self.config.id(),
                state = %self.lifecycle,
                error = %err,
                "Adapter stopped with error"
            ),
        }

        result
    }
}

/// Errors raised by [`PollingAdapter::start`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Start called outside the `Created` state
    #[error("cannot start adapter in state {0}")]
    InvalidState(Lifecycle),
    /// Publisher rejected the destination topic
    #[error("destination rejected: {0}")]
    Destination(#[source] PublishError),
}

/// Errors raised by [`PollingAdapter::poll`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// Poll called outside the `Running` state
    #[error("adapter is not running (state {0})")]
    NotRunning(Lifecycle),
    /// Error budget already spent; the adapter awaits removal
    #[error("error budget exhausted after {0} consecutive failures")]
    ErrorBudgetExhausted(u32),
    /// Counter cannot advance any further
    #[error("counter overflow")]
    CounterOverflow,
    /// Publishing the sample failed
    #[error("publish failed: {0}")]
    Publish(#[source] PublishError),
}

/// Errors raised by [`PollingAdapter::stop`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StopError {
    /// Releasing the destination failed; the adapter is stopped regardless
    #[error("release failed: {0}")]
    Release(#[source] PublishError),
}
