//! Carrier status codes and their classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Carrier codes for a fax that is still in flight.
pub const PENDING_CODES: &[&str] = &["queued", "processing", "sending"];

/// Carrier codes for a delivered fax.
pub const SUCCESS_CODES: &[&str] = &["delivered"];

/// Three-way classification of a carrier status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Still in progress; keep polling.
    Pending,
    /// Delivered.
    Success,
    /// Anything else, including codes this crate has never seen.
    Failure,
}

impl StatusClass {
    /// Returns true for [`StatusClass::Success`] and [`StatusClass::Failure`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A raw status code reported by the carrier.
///
/// The carrier vocabulary is open-ended, so the code is kept verbatim
/// and only interpreted through [`CarrierStatus::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarrierStatus(String);

impl CarrierStatus {
    /// Wraps a raw status code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The raw status code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Maps the code onto [`StatusClass`].
    ///
    /// Unrecognized codes are failures.
    #[must_use]
    pub fn classify(&self) -> StatusClass {
        let code = self.0.as_str();
        if PENDING_CODES.contains(&code) {
            StatusClass::Pending
        } else if SUCCESS_CODES.contains(&code) {
            StatusClass::Success
        } else {
            StatusClass::Failure
        }
    }
}

impl fmt::Display for CarrierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CarrierStatus {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}
