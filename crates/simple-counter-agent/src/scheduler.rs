//! Poll scheduling and the error-budget policy.
//!
//! Each adapter is owned by one [`run_adapter`] future, which guarantees
//! that `start`, `poll` and `stop` never overlap for that adapter. Shutdown
//! is only observed between polls; a poll in flight always completes.

use simple_counter_core::{PollingAdapter, StopReason};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// How an adapter's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Start failed; the adapter was never polled
    StartFailed,
    /// Stopped on shutdown
    Stopped,
    /// Removed after exhausting its error budget
    Removed,
}

/// Summary of one adapter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Adapter identifier
    pub adapter_id: String,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Successful polls
    pub polls: u64,
    /// Failed polls
    pub failures: u64,
}

/// Start `adapter`, poll it every polling interval until `shutdown` turns
/// true (or its sender is dropped), then stop it.
///
/// An adapter whose consecutive failures reach its error budget is removed
/// and not polled again.
pub async fn run_adapter<A: PollingAdapter>(
    mut adapter: A,
    mut shutdown: watch::Receiver<bool>,
) -> RunReport {
    let mut report = RunReport {
        adapter_id: adapter.id().to_string(),
        outcome: RunOutcome::Stopped,
        polls: 0,
        failures: 0,
    };

    if let Err(err) = adapter.start().await {
        tracing::error!(adapter_id = %report.adapter_id, error = %err, "Adapter start failed");
        if let Err(err) = adapter.stop().await {
            tracing::warn!(adapter_id = %report.adapter_id, error = %err, "Stop after failed start");
        }
        report.outcome = RunOutcome::StartFailed;
        return report;
    }

    let budget = adapter.error_budget();
    let mut ticker = tokio::time::interval(adapter.polling_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow_and_update() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        match adapter.poll().await {
            Ok(_) => report.polls += 1,
            Err(err) => {
                report.failures += 1;

                let consecutive = adapter.consecutive_errors();
                if budget.is_exhausted(consecutive) {
                    tracing::warn!(
                        adapter_id = %report.adapter_id,
                        consecutive_errors = consecutive,
                        error = %err,
                        "Error budget exhausted, removing adapter"
                    );
                    if let Err(err) = adapter.stop_with(StopReason::ErrorBudgetExhausted).await {
                        tracing::warn!(adapter_id = %report.adapter_id, error = %err, "Stop after removal");
                    }
                    report.outcome = RunOutcome::Removed;
                    return report;
                }

                tracing::debug!(
                    adapter_id = %report.adapter_id,
                    remaining = budget.remaining(consecutive),
                    "Poll failed, will retry on next tick"
                );
            }
        }
    }

    if let Err(err) = adapter.stop().await {
        tracing::warn!(adapter_id = %report.adapter_id, error = %err, "Adapter stop failed");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_counter_core::{
        DataPointBatch, PublishError, Publisher, RawAdapterConfig,
        SimpleCounterAdapter, COUNTER_DATA_POINT,
    };
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Publisher that succeeds or fails according to a script, then keeps
    /// repeating the fallback outcome.
    #[derive(Clone, Default)]
    struct ScriptedPublisher {
        inner: Arc<Mutex<Script>>,
    }

    #[derive(Default)]
    struct Script {
        outcomes: VecDeque<bool>,
        fallback_ok: bool,
        reject_destination: bool,
        published: Vec<(Instant, u64)>,
        attempts: Vec<Instant>,
    }

    impl ScriptedPublisher {
        fn new(outcomes: &[bool], fallback_ok: bool) -> Self {
            let publisher = Self::default();
            {
                let mut script = publisher.inner.lock().unwrap();
                script.outcomes = outcomes.iter().copied().collect();
                script.fallback_ok = fallback_ok;
            }
            publisher
        }

        fn rejecting() -> Self {
            let publisher = Self::default();
            publisher.inner.lock().unwrap().reject_destination = true;
            publisher
        }

        fn values(&self) -> Vec<u64> {
            self.inner
                .lock()
                .unwrap()
                .published
                .iter()
                .map(|(_, value)| *value)
                .collect()
        }

        fn attempts(&self) -> Vec<Instant> {
            self.inner.lock().unwrap().attempts.clone()
        }
    }

    impl Publisher for ScriptedPublisher {
        async fn publish(&self, _topic: &str, batch: &DataPointBatch) -> Result<(), PublishError> {
            let mut script = self.inner.lock().unwrap();
            let now = Instant::now();
            script.attempts.push(now);

            let ok = script.outcomes.pop_front().unwrap_or(script.fallback_ok);
            if !ok {
                return Err(PublishError::Transport("scripted failure".to_string()));
            }

            let value = batch
                .get(COUNTER_DATA_POINT)
                .and_then(serde_json::Value::as_u64)
                .unwrap();
            script.published.push((now, value));
            Ok(())
        }

        fn validate_destination(&self, topic: &str) -> Result<(), PublishError> {
            if self.inner.lock().unwrap().reject_destination {
                return Err(PublishError::InvalidTopic(topic.to_string()));
            }
            Ok(())
        }
    }

    fn adapter(
        initial: i64,
        max_errors: i64,
        publisher: ScriptedPublisher,
    ) -> SimpleCounterAdapter<ScriptedPublisher> {
        let config = RawAdapterConfig {
            initial_counter_value: initial,
            max_polling_errors_before_removal: max_errors,
            polling_interval_millis: 1000,
            ..RawAdapterConfig::new("counter-1")
        }
        .validate()
        .unwrap();
        SimpleCounterAdapter::new(config, publisher)
    }

    #[tokio::test(start_paused = true)]
    async fn removed_after_budget_exhausted() {
        let publisher = ScriptedPublisher::new(&[true], false);
        let (_tx, rx) = watch::channel(false);

        let report = run_adapter(adapter(5, 3, publisher.clone()), rx).await;

        assert_eq!(report.outcome, RunOutcome::Removed);
        assert_eq!(report.polls, 1);
        assert_eq!(report.failures, 3);
        assert_eq!(publisher.values(), [6]);
        assert_eq!(publisher.attempts().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_respect_interval() {
        let publisher = ScriptedPublisher::new(&[], false);
        let (_tx, rx) = watch::channel(false);

        run_adapter(adapter(0, 5, publisher.clone()), rx).await;

        let attempts = publisher.attempts();
        assert_eq!(attempts.len(), 5);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_before_budget_keeps_adapter() {
        let publisher = ScriptedPublisher::new(&[false, false], true);
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(run_adapter(adapter(0, 3, publisher.clone()), rx));
        tokio::time::sleep(Duration::from_millis(4500)).await;
        tx.send(true).unwrap();
        let report = task.await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.failures, 2);
        assert_eq!(report.polls, 3);
        assert_eq!(publisher.values(), [1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_poll() {
        let publisher = ScriptedPublisher::new(&[], true);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = run_adapter(adapter(0, 3, publisher.clone()), rx).await;

        assert_eq!(report.outcome, RunOutcome::Stopped);
        assert_eq!(report.polls, 0);
        assert!(publisher.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_stops_adapter() {
        let publisher = ScriptedPublisher::new(&[], true);
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let report = run_adapter(adapter(0, 3, publisher), rx).await;

        assert_eq!(report.outcome, RunOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_skips_polling() {
        let publisher = ScriptedPublisher::rejecting();
        let (_tx, rx) = watch::channel(false);

        let report = run_adapter(adapter(0, 3, publisher.clone()), rx).await;

        assert_eq!(report.outcome, RunOutcome::StartFailed);
        assert!(publisher.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn adapters_run_independently() {
        let healthy = ScriptedPublisher::new(&[], true);
        let failing = ScriptedPublisher::new(&[], false);
        let (tx, rx) = watch::channel(false);

        let healthy_task = tokio::spawn(run_adapter(adapter(0, 3, healthy.clone()), rx.clone()));
        let failing_task = tokio::spawn(run_adapter(adapter(0, 3, failing), rx));

        let failing_report = failing_task.await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tx.send(true).unwrap();
        let healthy_report = healthy_task.await.unwrap();

        assert_eq!(failing_report.outcome, RunOutcome::Removed);
        assert_eq!(healthy_report.outcome, RunOutcome::Stopped);
        assert!(healthy_report.polls >= 5);
        assert_eq!(healthy_report.failures, 0);
    }
}
