//! Routing of pipeline messages onto their queues.

use std::time::Duration;

use crate::message::{FaxJob, Message, WebhookNotification};

use super::{MessageQueue, OutboundMessage, QueueError};

/// Identifiers of the three pipeline queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEndpoints {
    /// Submission queue, consumed by the dispatch stage
    pub submission: String,
    /// Delayed retry queue, consumed by the retry stage
    pub retry: String,
    /// Webhook queue, consumed by the notify stage
    pub webhook: String,
}

impl QueueEndpoints {
    /// Creates endpoint identifiers.
    #[must_use]
    pub fn new(
        submission: impl Into<String>,
        retry: impl Into<String>,
        webhook: impl Into<String>,
    ) -> Self {
        Self {
            submission: submission.into(),
            retry: retry.into(),
            webhook: webhook.into(),
        }
    }
}

/// Deduplication id of a submission message.
///
/// Distinct per attempt so a scheduled retry is never mistaken for a
/// duplicate of the attempt that failed.
#[must_use]
pub fn submission_dedup_id(job: &FaxJob) -> String {
    format!("{}:{}", job.fax_id, job.retry_count)
}

/// Encodes pipeline messages and sends them to the right queue with the
/// right delivery attributes.
#[derive(Debug, Clone)]
pub struct Publisher<Q> {
    queue: Q,
    endpoints: QueueEndpoints,
    backoff_delay: Duration,
}

impl<Q> Publisher<Q> {
    /// Creates a publisher.
    ///
    /// `backoff_delay` is applied to every message on the retry queue.
    #[must_use]
    pub const fn new(queue: Q, endpoints: QueueEndpoints, backoff_delay: Duration) -> Self {
        Self {
            queue,
            endpoints,
            backoff_delay,
        }
    }

    /// Returns the retry backoff delay.
    #[must_use]
    pub const fn backoff_delay(&self) -> Duration {
        self.backoff_delay
    }
}

impl<Q: MessageQueue> Publisher<Q> {
    /// Sends a job to the submission queue.
    ///
    /// Ordered by destination number, deduplicated per attempt.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if encoding or the send fails.
    pub async fn enqueue_fax(&self, job: &FaxJob) -> Result<(), QueueError> {
        let message = OutboundMessage::new(&self.endpoints.submission, job.encode()?)
            .with_fifo(&job.to, submission_dedup_id(job));
        self.queue.send(message).await
    }

    /// Sends a job to the retry queue, withheld for the backoff delay.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if encoding or the send fails.
    pub async fn enqueue_retry(&self, job: &FaxJob) -> Result<(), QueueError> {
        let message = OutboundMessage::new(&self.endpoints.retry, job.encode()?)
            .with_delay(self.backoff_delay);
        self.queue.send(message).await
    }

    /// Sends a notification to the webhook queue for immediate delivery.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if encoding or the send fails.
    pub async fn enqueue_webhook(&self, notification: &WebhookNotification) -> Result<(), QueueError> {
        let message = OutboundMessage::new(&self.endpoints.webhook, notification.encode()?);
        self.queue.send(message).await
    }
}
