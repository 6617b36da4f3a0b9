//! Publishing seam between an adapter and its messaging transport.

use crate::datapoint::DataPointBatch;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Best-effort delivery of data point batches to a named destination.
///
/// Implementations report every delivery problem as a [`PublishError`]; the
/// adapter treats all of them alike. A publish that cannot finish must fail
/// rather than hang: enforcing a deadline is the implementation's job.
pub trait Publisher: Send + Sync {
    /// Publish a batch to `topic`.
    fn publish(
        &self,
        topic: &str,
        batch: &DataPointBatch,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;

    /// Check that `topic` is an acceptable destination before polling starts.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidTopic`] if the topic cannot be published to.
    fn validate_destination(&self, topic: &str) -> Result<(), PublishError> {
        if topic.is_empty() {
            return Err(PublishError::InvalidTopic("empty topic".to_string()));
        }
        Ok(())
    }

    /// Release anything held on behalf of `topic`.
    fn release(&self, _topic: &str) -> impl Future<Output = Result<(), PublishError>> + Send {
        async { Ok(()) }
    }
}

/// Errors reported by a [`Publisher`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Destination topic rejected
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
    /// Batch could not be encoded
    #[error("encode error: {0}")]
    Encode(String),
    /// Transport reported a failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Publish did not complete in time
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

/// In-memory publisher that records every batch.
///
/// Clones share the same record. Failures can be injected to exercise the
/// error path of an adapter.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    published: Vec<(String, DataPointBatch)>,
    released: Vec<String>,
    fail_next: usize,
    failing: bool,
}

impl MemoryPublisher {
    /// Create an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` publishes.
    pub fn fail_next(&self, count: usize) {
        self.state().fail_next = count;
    }

    /// Fail every publish until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Batches published so far, with their topics.
    #[must_use]
    pub fn published(&self) -> Vec<(String, DataPointBatch)> {
        self.state().published.clone()
    }

    /// Topics released so far.
    #[must_use]
    pub fn released(&self) -> Vec<String> {
        self.state().released.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, topic: &str, batch: &DataPointBatch) -> Result<(), PublishError> {
        let mut state = self.state();

        if state.failing {
            return Err(PublishError::Transport("injected failure".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PublishError::Transport("injected failure".to_string()));
        }

        state.published.push((topic.to_string(), batch.clone()));
        Ok(())
    }
}

impl Publisher for MemoryPublisher {
    fn publish(
        &self,
        topic: &str,
        batch: &DataPointBatch,
    ) -> impl Future<Output = Result<(), PublishError>> + Send {
        std::future::ready(self.record(topic, batch))
    }

    fn release(&self, topic: &str) -> impl Future<Output = Result<(), PublishError>> + Send {
        self.state().released.push(topic.to_string());
        std::future::ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn batch(value: u64) -> DataPointBatch {
        let mut batch = DataPointBatch::new("test");
        batch.add_data_point("counter", value);
        batch
    }

    #[test]
    fn records_batches() {
        let publisher = MemoryPublisher::new();

        block_on(publisher.publish("a/b", &batch(1))).unwrap();
        block_on(publisher.publish("a/c", &batch(2))).unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "a/b");
        assert_eq!(published[1].1.get("counter"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn fail_next_then_recover() {
        let publisher = MemoryPublisher::new();
        publisher.fail_next(2);

        assert!(block_on(publisher.publish("t", &batch(1))).is_err());
        assert!(block_on(publisher.publish("t", &batch(1))).is_err());
        assert!(block_on(publisher.publish("t", &batch(1))).is_ok());
        assert_eq!(publisher.published().len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let publisher = MemoryPublisher::new();
        let observer = publisher.clone();

        publisher.set_failing(true);
        assert!(block_on(publisher.publish("t", &batch(1))).is_err());

        observer.set_failing(false);
        block_on(publisher.publish("t", &batch(1))).unwrap();
        assert_eq!(observer.published().len(), 1);
    }

    #[test]
    fn default_destination_check() {
        let publisher = MemoryPublisher::new();

        assert!(publisher.validate_destination("x").is_ok());
        assert!(matches!(
            publisher.validate_destination(""),
            Err(PublishError::InvalidTopic(_))
        ));
    }
}
