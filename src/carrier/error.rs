//! Error types for carrier operations.

use thiserror::Error;

use crate::transport::HttpError;

/// Error type for carrier API calls.
#[derive(Debug, Error)]
pub enum CarrierError {
    /// The request never produced an HTTP response.
    #[error("Carrier request failed: {0}")]
    Http(#[from] HttpError),

    /// The carrier answered with a non-success status.
    #[error("Carrier returned HTTP {status}{}", body_suffix(.body))]
    Api {
        /// HTTP status code
        status: http::StatusCode,
        /// Response body, if valid UTF-8
        body: Option<String>,
    },

    /// The carrier response could not be parsed.
    #[error("Invalid carrier response: {0}")]
    Decode(#[source] serde_json::Error),
}

fn body_suffix(body: &Option<String>) -> String {
    body.as_ref().map(|b| format!(": {b}")).unwrap_or_default()
}
