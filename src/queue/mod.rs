//! Queue boundary between pipeline stages.
//!
//! This module provides:
//! - The queue capability trait ([`MessageQueue`]) and outbound messages ([`OutboundMessage`])
//! - Inbound records handed to stages ([`QueueRecord`])
//! - Routing of pipeline messages to their queues ([`Publisher`], [`QueueEndpoints`])
//! - An in-process at-least-once broker ([`MemoryBroker`], [`QueueConsumer`])
//!
//! # Submission deduplication
//!
//! The submission queue is FIFO: messages for the same destination number
//! share an ordering key, and each message carries the deduplication id
//! `"{fax_id}:{retry_count}"`. Re-enqueueing the same attempt inside the
//! dedup window is collapsed; the next attempt of the same fax has a new id
//! and always goes through. Retry and webhook queues do not deduplicate.
//!
//! A group delivers one record at a time. While a record is being handled
//! or waits for redelivery, later records of its group are held back.

mod memory;
mod publisher;


use std::time::Duration;

use thiserror::Error;

use crate::message::MessageError;

pub use memory::{MemoryBroker, QueueConsumer};
pub use publisher::{Publisher, QueueEndpoints, submission_dedup_id};

/// Error type for enqueue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No queue is registered under the endpoint.
    #[error("Unknown queue '{0}'")]
    UnknownQueue(String),

    /// The queue exists but its consumer has gone away.
    #[error("Queue '{0}' is closed")]
    Closed(String),

    /// The message could not be serialized.
    #[error(transparent)]
    Encode(#[from] MessageError),

    /// Broker-internal state is unusable.
    #[error("Queue broker state poisoned")]
    Poisoned,

    /// Backend-specific failure.
    #[error("Queue backend error: {0}")]
    Backend(String),
}

/// A message ready to be sent to a queue endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination queue identifier
    pub endpoint: String,
    /// Serialized message body
    pub body: String,
    /// How long the queue withholds the message before delivery
    pub delay: Duration,
    /// Ordering key for FIFO queues
    pub group_id: Option<String>,
    /// Deduplication id for FIFO queues
    pub dedup_id: Option<String>,
}

impl OutboundMessage {
    /// Creates an immediately deliverable, unordered message.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            body: body.into(),
            delay: Duration::ZERO,
            group_id: None,
            dedup_id: None,
        }
    }

    /// Sets the delivery delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the FIFO ordering key and deduplication id.
    #[must_use]
    pub fn with_fifo(mut self, group_id: impl Into<String>, dedup_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self.dedup_id = Some(dedup_id.into());
        self
    }
}

/// A message delivered to a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    /// Serialized message body
    pub body: String,
    /// How many times this record has been handed to a consumer, starting at 1
    pub receive_count: u32,
    /// FIFO ordering key, if the record was sent with one
    pub group_id: Option<String>,
}

impl QueueRecord {
    /// Creates a first-delivery record.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            receive_count: 1,
            group_id: None,
        }
    }

    /// Sets the FIFO ordering key.
    #[must_use]
    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// Capability to enqueue messages.
///
/// Stages publish through this trait so tests can record or fail enqueues.
pub trait MessageQueue: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the queue did not accept the message.
    fn send(
        &self,
        message: OutboundMessage,
    ) -> impl std::future::Future<Output = Result<(), QueueError>> + Send;
}
