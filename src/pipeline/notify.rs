//! Notify stage: POST a webhook payload to the caller's callback URL.

use thiserror::Error;

use crate::message::{Message, MessageError, WebhookNotification};
use crate::queue::QueueRecord;
use crate::transport::{HttpClient, HttpError, HttpRequest};

use super::{Stage, StageError, single_record};

/// Error type for a failed callback delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The callback URL could not be parsed.
    #[error("Invalid callback URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as stored in the notification
        url: String,
        /// Parser error
        reason: String,
    },

    /// The payload could not be serialized.
    #[error(transparent)]
    Encode(#[from] MessageError),

    /// No response was received.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The callback answered with a non-2xx status.
    #[error("Callback returned HTTP {status}")]
    NonSuccessStatus {
        /// Response status code
        status: http::StatusCode,
        /// Response body, if it was valid UTF-8
        body: Option<String>,
    },
}

/// Consumes the webhook queue.
///
/// Makes exactly one delivery attempt per activation. A failed attempt is
/// returned as an error so the queue redelivers the notification; there is
/// no retry loop in the stage itself.
#[derive(Debug)]
pub struct NotifyStage<H> {
    client: H,
}

impl<H> NotifyStage<H> {
    /// Creates a notify stage sending through `client`.
    #[must_use]
    pub const fn new(client: H) -> Self {
        Self { client }
    }
}

impl<H: HttpClient> NotifyStage<H> {
    /// POSTs the payload of `notification` as JSON to its callback URL.
    ///
    /// Only a 2xx response counts as delivered.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the URL is invalid, no response arrives,
    /// or the callback answers with any other status.
    pub async fn deliver(&self, notification: &WebhookNotification) -> Result<(), DeliveryError> {
        let url = url::Url::parse(&notification.callback_url).map_err(|e| {
            DeliveryError::InvalidUrl {
                url: notification.callback_url.clone(),
                reason: e.to_string(),
            }
        })?;
        let body = notification.payload.encode()?;

        tracing::debug!(
            fax_id = %notification.payload.fax_id,
            "Posting '{}' notification to {url}",
            notification.payload.status
        );

        let response = self
            .client
            .request(HttpRequest::post(url).with_json_body(body))
            .await?;

        if !response.is_success() {
            return Err(DeliveryError::NonSuccessStatus {
                status: response.status,
                body: response.body_text().map(String::from),
            });
        }

        tracing::info!(
            fax_id = %notification.payload.fax_id,
            "Delivered '{}' notification (HTTP {})",
            notification.payload.status,
            response.status
        );
        Ok(())
    }
}

impl<H: HttpClient> Stage for NotifyStage<H> {
    fn name(&self) -> &'static str {
        "notify"
    }

    async fn handle(&self, records: &[QueueRecord]) -> Result<(), StageError> {
        let record = single_record(self.name(), records);
        let notification = WebhookNotification::decode(&record.body)?;
        self.deliver(&notification).await?;
        Ok(())
    }
}
