//! Messages exchanged between pipeline stages.
//!
//! Every record that travels through a queue is one of these types,
//! serialized as a compact JSON object:
//! - [`FaxJob`] on the submission and retry queues
//! - [`WebhookNotification`] (wrapping a [`WebhookPayload`]) on the webhook queue
//!
//! Decoding ignores unknown fields. Missing `retry_count` defaults to 0 and
//! missing `timestamp` defaults to the decode-time clock.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::time::unix_now;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Error type for message encoding and decoding.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The message body is not a valid encoding of the expected type.
    #[error("Failed to decode {kind}: {source}")]
    Decode {
        /// Name of the expected message type
        kind: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The message could not be serialized.
    #[error("Failed to encode {kind}: {source}")]
    Encode {
        /// Name of the message type
        kind: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

/// JSON codec shared by all queue message types.
///
/// The associated `KIND` names the type in error messages.
pub trait Message: Serialize + DeserializeOwned {
    /// Human-readable message type name.
    const KIND: &'static str;

    /// Parses a message from its JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Decode`] if the body is not valid JSON
    /// or is missing required fields.
    fn decode(body: &str) -> Result<Self, MessageError> {
        serde_json::from_str(body).map_err(|source| MessageError::Decode {
            kind: Self::KIND,
            source,
        })
    }

    /// Serializes the message to a compact JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::Encode`] if serialization fails.
    fn encode(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|source| MessageError::Encode {
            kind: Self::KIND,
            source,
        })
    }
}

/// One outbound fax attempt.
///
/// `retry_count` is the number of failed attempts that preceded this one.
/// It is only ever increased, by exactly one, when a failed dispatch
/// schedules a retry (see [`FaxJob::next_attempt`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaxJob {
    /// Caller-assigned fax identifier, echoed back in notifications
    pub fax_id: String,
    /// Destination fax number
    pub to: String,
    /// URL of the PDF to transmit
    pub pdf_url: String,
    /// Where outcome notifications are delivered
    pub callback_url: String,
    /// Number of previous failed attempts
    #[serde(default)]
    pub retry_count: u32,
}

impl FaxJob {
    /// Creates a first-attempt job (`retry_count = 0`).
    #[must_use]
    pub fn new(
        fax_id: impl Into<String>,
        to: impl Into<String>,
        pdf_url: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            fax_id: fax_id.into(),
            to: to.into(),
            pdf_url: pdf_url.into(),
            callback_url: callback_url.into(),
            retry_count: 0,
        }
    }

    /// Sets the retry count.
    #[must_use]
    pub const fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// 1-based number of the attempt this job represents.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Returns the same job as its next attempt.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self {
            retry_count: self.attempt(),
            ..self.clone()
        }
    }
}

impl Message for FaxJob {
    const KIND: &'static str = "fax job";
}

/// Delivery outcome reported to the calling application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaxStatus {
    /// The carrier delivered the fax.
    #[serde(rename = "sent")]
    Sent,
    /// This attempt failed; a retry has been scheduled.
    #[serde(rename = "tmp_fail")]
    TemporaryFailure,
    /// All attempts failed; no further retries.
    #[serde(rename = "perm_fail")]
    PermanentFailure,
}

impl FaxStatus {
    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::TemporaryFailure => "tmp_fail",
            Self::PermanentFailure => "perm_fail",
        }
    }
}

impl fmt::Display for FaxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body POSTed to the caller's callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Identifier of the fax this notification is about
    pub fax_id: String,
    /// Outcome of the attempt
    pub status: FaxStatus,
    /// Human-readable description of the outcome
    pub message: String,
    /// Seconds since the Unix epoch at which the payload was created
    #[serde(default = "unix_now")]
    pub timestamp: i64,
}

impl WebhookPayload {
    /// Creates a payload stamped with the current system time.
    #[must_use]
    pub fn new(fax_id: impl Into<String>, status: FaxStatus, message: impl Into<String>) -> Self {
        Self::at(fax_id, status, message, unix_now())
    }

    /// Creates a payload with an explicit timestamp.
    #[must_use]
    pub fn at(
        fax_id: impl Into<String>,
        status: FaxStatus,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            fax_id: fax_id.into(),
            status,
            message: message.into(),
            timestamp,
        }
    }
}

impl Message for WebhookPayload {
    const KIND: &'static str = "webhook payload";
}

/// A payload paired with its destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotification {
    /// URL the payload is POSTed to
    pub callback_url: String,
    /// Notification body
    pub payload: WebhookPayload,
}

impl WebhookNotification {
    /// Creates a notification.
    #[must_use]
    pub fn new(callback_url: impl Into<String>, payload: WebhookPayload) -> Self {
        Self {
            callback_url: callback_url.into(),
            payload,
        }
    }
}

impl Message for WebhookNotification {
    const KIND: &'static str = "webhook notification";
}
