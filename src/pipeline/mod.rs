//! The three-stage fax delivery pipeline.
//!
//! ```text
//! producer -> submission -> DispatchStage -> webhook -> NotifyStage -> callback
//!                 ^               |
//!                 |               +-> retry (delayed) -> RetryStage --+
//!                 +---------------------------------------------------+
//! ```
//!
//! Every stage is activated with the records of one queue delivery and
//! must receive exactly one. A returned [`StageError`] means the activation
//! failed and the queue should redeliver the record; which failures are
//! swallowed instead is decided by the [`FailurePolicy`] table in [`policy`].

mod dispatch;
mod notify;
pub mod policy;
mod retry;

#[cfg(test)]
mod dispatch_tests;

use thiserror::Error;

use crate::carrier::CarrierError;
use crate::message::MessageError;
use crate::queue::{QueueError, QueueRecord};

pub use dispatch::{DispatchStage, POLL_INTERVAL};
pub use notify::{DeliveryError, NotifyStage};
pub use policy::{FailurePolicy, Outcome};
pub use retry::RetryStage;

/// Error type for a failed stage activation.
#[derive(Debug, Error)]
pub enum StageError {
    /// The record body is not the message type this stage consumes.
    #[error(transparent)]
    Decode(#[from] MessageError),

    /// The carrier did not accept the fax.
    #[error("Carrier submission failed: {0}")]
    Submit(#[source] CarrierError),

    /// A follow-up message could not be enqueued.
    #[error("Failed to enqueue {what}: {source}")]
    Enqueue {
        /// Which message was being enqueued
        what: &'static str,
        /// Underlying queue error
        #[source]
        source: QueueError,
    },

    /// The callback did not accept the notification.
    #[error("Webhook delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

/// One pipeline stage, activated once per queue delivery.
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the records of one activation.
    ///
    /// # Panics
    ///
    /// Implementations panic unless `records` holds exactly one record.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] when the record must be redelivered.
    fn handle(
        &self,
        records: &[QueueRecord],
    ) -> impl std::future::Future<Output = Result<(), StageError>> + Send;
}

/// Returns the only record of an activation.
///
/// # Panics
///
/// Panics if `records` does not hold exactly one record. Queues feeding the
/// pipeline are configured with a batch size of one, so anything else is a
/// deployment error and fails the activation outright.
#[must_use]
pub fn single_record<'a>(stage: &str, records: &'a [QueueRecord]) -> &'a QueueRecord {
    match records {
        [record] => record,
        _ => panic!(
            "{stage} stage expects exactly one record per activation, got {}",
            records.len()
        ),
    }
}
