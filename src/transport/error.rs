//! Error types for HTTP operations.

use thiserror::Error;

/// Error type for HTTP operations.
///
/// Covers failures that produced no HTTP response at all. Non-success
/// status codes are not errors at this layer.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed (DNS, refused, reset, TLS).
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server did not respond within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The request URL could not be used.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
