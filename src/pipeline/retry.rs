//! Retry stage: move a delayed job back onto the submission queue.

use crate::message::{FaxJob, Message};
use crate::queue::{MessageQueue, Publisher, QueueRecord};

use super::{Stage, StageError, single_record};

/// Consumes the retry queue.
///
/// By the time a job arrives here the queue has already enforced the backoff
/// delay, so the stage republishes it to the submission queue unchanged.
/// The retry count was incremented when the retry was scheduled.
#[derive(Debug)]
pub struct RetryStage<Q> {
    publisher: Publisher<Q>,
}

impl<Q> RetryStage<Q> {
    /// Creates a retry stage.
    #[must_use]
    pub const fn new(publisher: Publisher<Q>) -> Self {
        Self { publisher }
    }
}

impl<Q: MessageQueue> RetryStage<Q> {
    /// Republishes `job` to the submission queue.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Enqueue`] if the submission queue rejects it.
    pub async fn republish(&self, job: &FaxJob) -> Result<(), StageError> {
        tracing::info!(
            fax_id = %job.fax_id,
            "Resubmitting fax for attempt {}",
            job.attempt()
        );
        self.publisher
            .enqueue_fax(job)
            .await
            .map_err(|source| StageError::Enqueue {
                what: "fax job",
                source,
            })
    }
}

impl<Q: MessageQueue> Stage for RetryStage<Q> {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn handle(&self, records: &[QueueRecord]) -> Result<(), StageError> {
        let record = single_record(self.name(), records);
        let job = FaxJob::decode(&record.body)?;
        self.republish(&job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueEndpoints;
    use crate::queue::mock::RecordingQueue;
    use std::sync::Arc;
    use std::time::Duration;

    fn stage() -> (Arc<RecordingQueue>, RetryStage<Arc<RecordingQueue>>) {
        let queue = Arc::new(RecordingQueue::new());
        let publisher = Publisher::new(
            queue.clone(),
            QueueEndpoints::new("fax-queue-url", "retry-queue-url", "webhook-queue-url"),
            Duration::from_secs(100),
        );
        (queue, RetryStage::new(publisher))
    }

    fn record(job: &FaxJob) -> QueueRecord {
        QueueRecord::new(job.encode().unwrap())
    }

    #[tokio::test]
    async fn republishes_job_unchanged() {
        let (queue, stage) = stage();
        let job = FaxJob::new("a", "b", "c", "d").with_retry_count(5);

        stage.handle(&[record(&job)]).await.unwrap();

        let sent = queue.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].endpoint, "fax-queue-url");
        assert_eq!(FaxJob::decode(&sent[0].body).unwrap(), job);
        assert_eq!(sent[0].delay, Duration::ZERO);
    }

    #[tokio::test]
    async fn republished_job_is_grouped_and_deduplicated() {
        let (queue, stage) = stage();
        let job = FaxJob::new("a", "b", "c", "d").with_retry_count(5);

        stage.handle(&[record(&job)]).await.unwrap();

        let sent = queue.sent();
        assert_eq!(sent[0].group_id.as_deref(), Some("b"));
        assert_eq!(sent[0].dedup_id.as_deref(), Some("a:5"));
    }

    #[tokio::test]
    async fn enqueue_failure_propagates() {
        let (queue, stage) = stage();
        queue.fail_endpoint("fax-queue-url");
        let job = FaxJob::new("a", "b", "c", "d").with_retry_count(1);

        let err = stage.handle(&[record(&job)]).await.unwrap_err();
        assert!(matches!(err, StageError::Enqueue { what: "fax job", .. }));
    }

    #[tokio::test]
    async fn malformed_record_is_a_decode_error() {
        let (queue, stage) = stage();

        let err = stage
            .handle(&[QueueRecord::new("{\"fax_id\": 1}")])
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Decode(_)));
        assert!(queue.attempted_endpoints().is_empty());
    }

    #[tokio::test]
    #[should_panic(expected = "retry stage expects exactly one record per activation, got 2")]
    async fn batch_of_two_panics() {
        let (_, stage) = stage();
        let job = FaxJob::new("a", "b", "c", "d");

        let _ = stage.handle(&[record(&job), record(&job)]).await;
    }
}
