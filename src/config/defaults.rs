//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

/// Default attempt budget per fax, the first attempt included.
pub const MAX_FAX_ATTEMPTS: u32 = 10;

/// Default delay in seconds between a failed attempt and its retry.
pub const BACKOFF_DELAY_SECS: u64 = 100;

/// Default submission queue identifier.
pub const SUBMISSION_QUEUE: &str = "fax-submission";

/// Default retry queue identifier.
pub const RETRY_QUEUE: &str = "fax-retry";

/// Default webhook queue identifier.
pub const WEBHOOK_QUEUE: &str = "fax-webhook";

/// Default carrier API root.
pub const CARRIER_BASE_URL: &str = "https://fax.twilio.com/v1/";

/// Default carrier API request timeout in seconds.
pub const CARRIER_TIMEOUT_SECS: u64 = 30;

/// Default callback request timeout in seconds.
pub const WEBHOOK_TIMEOUT_SECS: u64 = 30;

/// Default deadline in seconds for one stage activation.
pub const ACTIVATION_TIMEOUT_SECS: u64 = 900;

/// Default wait in seconds before a failed record is redelivered.
pub const REDELIVERY_DELAY_SECS: u64 = 30;

/// Default number of deliveries before a record is dead-lettered.
pub const MAX_RECEIVE_COUNT: u32 = 5;
