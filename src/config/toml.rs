//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Carrier account section
    #[serde(default)]
    pub carrier: CarrierSection,

    /// Queue endpoint section
    #[serde(default)]
    pub queues: QueuesSection,

    /// Attempt and notification section
    #[serde(default)]
    pub delivery: DeliverySection,

    /// Local worker runtime section
    #[serde(default)]
    pub worker: WorkerSection,
}

/// Carrier account section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarrierSection {
    /// Account SID
    pub account_sid: Option<String>,

    /// Auth token
    pub auth_token: Option<String>,

    /// Fax number to send from
    pub from_number: Option<String>,

    /// API root URL
    pub base_url: Option<String>,

    /// API request timeout in seconds
    pub timeout: Option<u64>,
}

/// Queue endpoint section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueuesSection {
    /// Submission queue identifier
    pub submission: Option<String>,

    /// Retry queue identifier
    pub retry: Option<String>,

    /// Webhook queue identifier
    pub webhook: Option<String>,
}

/// Attempt and notification section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliverySection {
    /// Attempts per fax, the first one included
    pub max_attempts: Option<u32>,

    /// Delay in seconds before a failed fax is retried
    pub backoff_delay: Option<u64>,

    /// Callback request timeout in seconds
    pub webhook_timeout: Option<u64>,
}

/// Local worker runtime section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSection {
    /// Deadline in seconds for one stage activation
    pub activation_timeout: Option<u64>,

    /// Delay in seconds before a failed record is redelivered
    pub redelivery_delay: Option<u64>,

    /// Deliveries before a record is dead-lettered
    pub max_receive_count: Option<u32>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# fax-relay Configuration File
# Every value can also be given on the command line; see `fax-relay --help`.

[carrier]
# Account SID (required, env: TWILIO_SID)
# account_sid = "ACxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"

# Auth token (required, env: TWILIO_AUTH_TOKEN)
# auth_token = "your-auth-token"

# Fax number to send from (required, env: TWILIO_PHONE_NUMBER)
# from_number = "+15550001111"

# API root URL (default: https://fax.twilio.com/v1/)
# base_url = "https://fax.twilio.com/v1/"

# API request timeout in seconds (default: 30)
# A status poll that times out is retried on the next poll.
# timeout = 30

[queues]
# Queue identifiers; must be distinct
# (env: FAX_QUEUE_URL, RETRY_QUEUE_URL, WEBHOOK_QUEUE_URL)
# submission = "fax-submission"
# retry = "fax-retry"
# webhook = "fax-webhook"

[delivery]
# Attempts per fax, the first one included (default: 10, env: MAX_FAX_ATTEMPTS)
# max_attempts = 10

# Delay in seconds before a failed fax is retried (default: 100, env: BACKOFF_DELAY)
# backoff_delay = 100

# Callback request timeout in seconds (default: 30)
# webhook_timeout = 30

[worker]
# Deadline in seconds for one stage activation (default: 900)
# Must exceed the 5 minute carrier TTL.
# activation_timeout = 900

# Delay in seconds before a failed record is redelivered (default: 30)
# redelivery_delay = 30

# Deliveries before a record is dead-lettered (default: 5)
# max_receive_count = 5
"#
    .to_string()
}
