//! Carrier layer for transmitting faxes and observing their status.
//!
//! This module provides:
//! - The carrier capability trait ([`Carrier`])
//! - Submission parameters ([`SubmitRequest`]) and handles ([`JobHandle`])
//! - Status codes and their classification ([`CarrierStatus`], [`StatusClass`])
//! - The Twilio Programmable Fax implementation ([`TwilioCarrier`])

mod error;
mod status;
mod twilio;


use std::fmt;

use crate::message::FaxJob;

pub use error::CarrierError;
pub use status::{CarrierStatus, PENDING_CODES, SUCCESS_CODES, StatusClass};
pub use twilio::{TwilioCarrier, TwilioCredentials};

/// How long the carrier may hold a fax before failing it, in minutes.
///
/// Kept well under the dispatch activation deadline so the carrier gives up
/// before the orchestrator would redeliver the job.
pub const CARRIER_TTL_MINUTES: u32 = 5;

/// Parameters for one carrier submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Destination fax number
    pub to: String,
    /// Publicly fetchable URL of the document to send
    pub media_url: String,
    /// Carrier-side time-to-live in minutes
    pub ttl_minutes: u32,
    /// Whether the carrier may retain a copy of the document
    pub store_media: bool,
}

impl SubmitRequest {
    /// Builds the submission for a fax job.
    ///
    /// Faxes may carry sensitive content, so media retention is always
    /// disabled and the TTL is fixed at [`CARRIER_TTL_MINUTES`].
    #[must_use]
    pub fn for_job(job: &FaxJob) -> Self {
        Self {
            to: job.to.clone(),
            media_url: job.pdf_url.clone(),
            ttl_minutes: CARRIER_TTL_MINUTES,
            store_media: false,
        }
    }
}

/// Carrier-assigned identifier of a submitted fax.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    /// Wraps a carrier identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability to send faxes through an external carrier.
///
/// Injected into the dispatch stage so tests can script carrier behavior.
pub trait Carrier: Send + Sync {
    /// Submits a fax for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError`] if the carrier rejects or never receives
    /// the submission.
    fn submit(
        &self,
        request: &SubmitRequest,
    ) -> impl std::future::Future<Output = Result<JobHandle, CarrierError>> + Send;

    /// Fetches the current status of a submitted fax.
    ///
    /// # Errors
    ///
    /// Returns [`CarrierError`] if the status cannot be retrieved.
    fn fetch_status(
        &self,
        handle: &JobHandle,
    ) -> impl std::future::Future<Output = Result<CarrierStatus, CarrierError>> + Send;
}
