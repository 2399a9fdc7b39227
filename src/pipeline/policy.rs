//! Dispatch outcomes and the swallow/propagate table for their enqueues.
//!
//! | Outcome              | Notification enqueue fails | Retry enqueue fails |
//! |----------------------|----------------------------|---------------------|
//! | `Sent`               | swallow                    | n/a                 |
//! | `TemporaryFailure`   | propagate                  | propagate           |
//! | `PermanentFailure`   | propagate                  | n/a                 |
//!
//! Propagating fails the dispatch activation, so the queue redelivers the job
//! and the carrier is asked to send it again. After a delivered fax that
//! would mean a duplicate send, so a lost success notification is accepted
//! instead. On the failure paths there is nothing to duplicate yet and a lost
//! notification would leave the caller without a terminal answer.

use crate::carrier::StatusClass;
use crate::message::{FaxJob, FaxStatus};
use crate::queue::QueueError;

use super::StageError;

/// What to do when an enqueue fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the error and carry on.
    Swallow,
    /// Fail the activation.
    Propagate,
}

impl FailurePolicy {
    /// Applies the policy to an enqueue result.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Enqueue`] when the result is an error and the
    /// policy is [`FailurePolicy::Propagate`].
    pub fn apply(
        self,
        result: Result<(), QueueError>,
        what: &'static str,
        fax_id: &str,
    ) -> Result<(), StageError> {
        match (self, result) {
            (_, Ok(())) => Ok(()),
            (Self::Swallow, Err(e)) => {
                tracing::error!(fax_id, "Error enqueueing {what}, not retrying: {e}");
                Ok(())
            }
            (Self::Propagate, Err(source)) => Err(StageError::Enqueue { what, source }),
        }
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The carrier delivered the fax.
    Sent,
    /// The attempt failed and another one will be scheduled.
    TemporaryFailure,
    /// The attempt failed and it was the last one allowed.
    PermanentFailure,
}

impl Outcome {
    /// Decides the outcome of `job` from its terminal carrier status.
    ///
    /// Anything other than [`StatusClass::Success`] counts as a failed attempt.
    #[must_use]
    pub const fn decide(class: StatusClass, job: &FaxJob, max_attempts: u32) -> Self {
        match class {
            StatusClass::Success => Self::Sent,
            StatusClass::Pending | StatusClass::Failure if job.attempt() >= max_attempts => {
                Self::PermanentFailure
            }
            StatusClass::Pending | StatusClass::Failure => Self::TemporaryFailure,
        }
    }

    /// Status reported to the caller.
    #[must_use]
    pub const fn fax_status(self) -> FaxStatus {
        match self {
            Self::Sent => FaxStatus::Sent,
            Self::TemporaryFailure => FaxStatus::TemporaryFailure,
            Self::PermanentFailure => FaxStatus::PermanentFailure,
        }
    }

    /// Whether a retry job follows the notification.
    #[must_use]
    pub const fn schedules_retry(self) -> bool {
        matches!(self, Self::TemporaryFailure)
    }

    /// Policy for a failed notification enqueue.
    #[must_use]
    pub const fn on_notification_error(self) -> FailurePolicy {
        match self {
            Self::Sent => FailurePolicy::Swallow,
            Self::TemporaryFailure | Self::PermanentFailure => FailurePolicy::Propagate,
        }
    }

    /// Policy for a failed retry enqueue.
    #[must_use]
    pub const fn on_retry_error(self) -> FailurePolicy {
        FailurePolicy::Propagate
    }
}
