//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::carrier::{CARRIER_TTL_MINUTES, TwilioCredentials};
use crate::queue::QueueEndpoints;

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Carrier account credentials (required)
    pub credentials: TwilioCredentials,

    /// Fax number to send from (required)
    pub from_number: String,

    /// Carrier API root
    pub carrier_url: Url,

    /// Carrier API request timeout
    pub carrier_timeout: Duration,

    /// Queue identifiers
    pub endpoints: QueueEndpoints,

    /// Attempts per fax, the first one included
    pub max_fax_attempts: u32,

    /// Delay between a failed attempt and its retry
    pub backoff_delay: Duration,

    /// Callback request timeout
    pub webhook_timeout: Duration,

    /// Deadline for one stage activation
    pub activation_timeout: Duration,

    /// Delay before a failed record is redelivered
    pub redelivery_delay: Duration,

    /// Deliveries before a record is dead-lettered
    pub max_receive_count: u32,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config {{ account: {}, from: {}, carrier: {}, queues: {}/{}/{}, \
             attempts: {}, backoff: {}s, activation_timeout: {}s, redelivery: {}x/{}s }}",
            self.credentials.account_sid,
            self.from_number,
            self.carrier_url,
            self.endpoints.submission,
            self.endpoints.retry,
            self.endpoints.webhook,
            self.max_fax_attempts,
            self.backoff_delay.as_secs(),
            self.activation_timeout.as_secs(),
            self.max_receive_count,
            self.redelivery_delay.as_secs(),
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Carrier credentials or the sending number are missing
    /// - The carrier URL is invalid
    /// - A count is zero
    /// - A duration is zero, or the activation deadline does not exceed the carrier TTL
    /// - Queue identifiers are empty or not distinct
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let credentials = Self::resolve_credentials(cli, toml)?;
        let from_number = Self::resolve_from_number(cli, toml)?;
        let carrier_url = Self::resolve_carrier_url(cli, toml)?;
        let endpoints = Self::resolve_endpoints(cli, toml)?;

        let delivery = toml.map(|t| &t.delivery);
        let worker = toml.map(|t| &t.worker);

        // Priority: CLI explicit > TOML > default
        let max_fax_attempts = positive_count(
            "max_attempts",
            cli.max_attempts
                .or_else(|| delivery.and_then(|d| d.max_attempts))
                .unwrap_or(defaults::MAX_FAX_ATTEMPTS),
        )?;

        let backoff_delay = positive_secs(
            "backoff_delay",
            cli.backoff_delay
                .or_else(|| delivery.and_then(|d| d.backoff_delay))
                .unwrap_or(defaults::BACKOFF_DELAY_SECS),
        )?;

        let carrier_timeout = positive_secs(
            "carrier_timeout",
            cli.carrier_timeout
                .or_else(|| toml.and_then(|t| t.carrier.timeout))
                .unwrap_or(defaults::CARRIER_TIMEOUT_SECS),
        )?;

        let webhook_timeout = positive_secs(
            "webhook_timeout",
            cli.webhook_timeout
                .or_else(|| delivery.and_then(|d| d.webhook_timeout))
                .unwrap_or(defaults::WEBHOOK_TIMEOUT_SECS),
        )?;

        let activation_timeout = Self::resolve_activation_timeout(cli, toml)?;

        let redelivery_delay = positive_secs(
            "redelivery_delay",
            cli.redelivery_delay
                .or_else(|| worker.and_then(|w| w.redelivery_delay))
                .unwrap_or(defaults::REDELIVERY_DELAY_SECS),
        )?;

        let max_receive_count = positive_count(
            "max_receive_count",
            cli.max_receive_count
                .or_else(|| worker.and_then(|w| w.max_receive_count))
                .unwrap_or(defaults::MAX_RECEIVE_COUNT),
        )?;

        Ok(Self {
            credentials,
            from_number,
            carrier_url,
            carrier_timeout,
            endpoints,
            max_fax_attempts,
            backoff_delay,
            webhook_timeout,
            activation_timeout,
            redelivery_delay,
            max_receive_count,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    fn resolve_credentials(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<TwilioCredentials, ConfigError> {
        let carrier = toml.map(|t| &t.carrier);

        let account_sid = non_empty(
            cli.account_sid.as_deref(),
            carrier.and_then(|c| c.account_sid.as_deref()),
        )
        .ok_or_else(|| {
            ConfigError::missing(
                field::ACCOUNT_SID,
                "Use --account-sid, TWILIO_SID, or set carrier.account_sid in config file",
            )
        })?;

        let auth_token = non_empty(
            cli.auth_token.as_deref(),
            carrier.and_then(|c| c.auth_token.as_deref()),
        )
        .ok_or_else(|| {
            ConfigError::missing(
                field::AUTH_TOKEN,
                "Use --auth-token, TWILIO_AUTH_TOKEN, or set carrier.auth_token in config file",
            )
        })?;

        Ok(TwilioCredentials::new(account_sid, auth_token))
    }

    fn resolve_from_number(cli: &Cli, toml: Option<&TomlConfig>) -> Result<String, ConfigError> {
        non_empty(
            cli.from_number.as_deref(),
            toml.and_then(|t| t.carrier.from_number.as_deref()),
        )
        .map(str::to_string)
        .ok_or_else(|| {
            ConfigError::missing(
                field::FROM_NUMBER,
                "Use --from-number, TWILIO_PHONE_NUMBER, or set carrier.from_number in config file",
            )
        })
    }

    fn resolve_carrier_url(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Url, ConfigError> {
        let url_str = cli
            .carrier_url
            .as_deref()
            .or_else(|| toml.and_then(|t| t.carrier.base_url.as_deref()))
            .unwrap_or(defaults::CARRIER_BASE_URL);

        let url = Url::parse(url_str).map_err(|e| ConfigError::InvalidUrl {
            url: url_str.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: url_str.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(url)
    }

    fn resolve_endpoints(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<QueueEndpoints, ConfigError> {
        let queues = toml.map(|t| &t.queues);

        let submission = cli
            .fax_queue
            .as_deref()
            .or_else(|| queues.and_then(|q| q.submission.as_deref()))
            .unwrap_or(defaults::SUBMISSION_QUEUE);
        let retry = cli
            .retry_queue
            .as_deref()
            .or_else(|| queues.and_then(|q| q.retry.as_deref()))
            .unwrap_or(defaults::RETRY_QUEUE);
        let webhook = cli
            .webhook_queue
            .as_deref()
            .or_else(|| queues.and_then(|q| q.webhook.as_deref()))
            .unwrap_or(defaults::WEBHOOK_QUEUE);

        for (name, value) in [
            ("submission", submission),
            ("retry", retry),
            ("webhook", webhook),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidQueues(format!(
                    "{name} queue identifier must not be empty"
                )));
            }
        }

        if submission == retry || submission == webhook || retry == webhook {
            return Err(ConfigError::InvalidQueues(format!(
                "queue identifiers must be distinct (submission: {submission}, retry: {retry}, \
                 webhook: {webhook})"
            )));
        }

        Ok(QueueEndpoints::new(submission, retry, webhook))
    }

    fn resolve_activation_timeout(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Duration, ConfigError> {
        let seconds = cli
            .activation_timeout
            .or_else(|| toml.and_then(|t| t.worker.activation_timeout))
            .unwrap_or(defaults::ACTIVATION_TIMEOUT_SECS);

        let ttl_secs = u64::from(CARRIER_TTL_MINUTES) * 60;
        if seconds <= ttl_secs {
            return Err(ConfigError::InvalidDuration {
                field: "activation_timeout",
                reason: format!("must exceed the carrier TTL of {ttl_secs}s, got {seconds}s"),
            });
        }

        Ok(Duration::from_secs(seconds))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

// Helper functions

/// The higher-priority value, unless it is absent or blank.
fn non_empty<'a>(cli: Option<&'a str>, toml: Option<&'a str>) -> Option<&'a str> {
    cli.or(toml).filter(|s| !s.trim().is_empty())
}

fn positive_secs(field: &'static str, seconds: u64) -> Result<Duration, ConfigError> {
    if seconds == 0 {
        return Err(ConfigError::InvalidDuration {
            field,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(Duration::from_secs(seconds))
}

fn positive_count(field: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidCount {
            field,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(value)
}
