//! Adapter configuration and validation.
//!
//! Configuration arrives as a [`RawAdapterConfig`] (whatever the loader
//! deserialized) and becomes an [`AdapterConfig`] only through
//! [`RawAdapterConfig::validate`]. An `AdapterConfig` is therefore always
//! within range and never changes after construction.

use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Default time between two polls.
pub const DEFAULT_POLLING_INTERVAL_MILLIS: i64 = 1000;

/// Default consecutive-error budget.
pub const DEFAULT_MAX_POLLING_ERRORS: i64 = 10;

/// Smallest accepted consecutive-error budget.
pub const MIN_MAX_POLLING_ERRORS: i64 = 3;

/// Topic used when a configuration entry omits one.
pub const DEFAULT_DESTINATION_TOPIC: &str = "simple-counter/value";

/// Longest accepted adapter identifier.
pub const MAX_ID_LENGTH: usize = 1024;

/// Unvalidated adapter configuration, as read from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAdapterConfig {
    /// Unique identifier for this adapter instance
    pub id: String,

    /// Time in milliseconds between two polls
    #[serde(default = "default_polling_interval_millis")]
    pub polling_interval_millis: i64,

    /// Consecutive failed polls tolerated before the adapter is removed
    #[serde(default = "default_max_polling_errors")]
    pub max_polling_errors_before_removal: i64,

    /// Value the counter starts from
    #[serde(default)]
    pub initial_counter_value: i64,

    /// Topic the samples are published to
    #[serde(default = "default_destination_topic", alias = "mqttTopic")]
    pub destination_topic: String,

    /// Advance the counter even when publishing the new value fails
    #[serde(default)]
    pub advance_counter_on_publish_failure: bool,
}

fn default_polling_interval_millis() -> i64 {
    DEFAULT_POLLING_INTERVAL_MILLIS
}

fn default_max_polling_errors() -> i64 {
    DEFAULT_MAX_POLLING_ERRORS
}

fn default_destination_topic() -> String {
    DEFAULT_DESTINATION_TOPIC.to_string()
}

impl RawAdapterConfig {
    /// Create a configuration with the given id and defaults for everything else.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            polling_interval_millis: DEFAULT_POLLING_INTERVAL_MILLIS,
            max_polling_errors_before_removal: DEFAULT_MAX_POLLING_ERRORS,
            initial_counter_value: 0,
            destination_topic: default_destination_topic(),
            advance_counter_on_publish_failure: false,
        }
    }

    /// Check every field against its constraints.
    ///
    /// # Errors
    ///
    /// Returns the first constraint violation found, checking fields in
    /// declaration order.
    pub fn validate(self) -> Result<AdapterConfig, ConfigError> {
        validate_id(&self.id)?;

        let polling_interval_millis = bounded(
            "pollingIntervalMillis",
            self.polling_interval_millis,
            1,
            i64::MAX,
        )?;
        let max_polling_errors_before_removal = bounded(
            "maxPollingErrorsBeforeRemoval",
            self.max_polling_errors_before_removal,
            MIN_MAX_POLLING_ERRORS,
            i64::from(u32::MAX),
        )?;
        let initial_counter_value = bounded(
            "initialCounterValue",
            self.initial_counter_value,
            0,
            i64::MAX,
        )?;

        if self.destination_topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }

        Ok(AdapterConfig {
            id: self.id,
            polling_interval_millis,
            max_polling_errors_before_removal,
            initial_counter_value,
            destination_topic: self.destination_topic,
            advance_counter_on_publish_failure: self.advance_counter_on_publish_failure,
        })
    }
}

fn validate_id(id: &str) -> Result<(), ConfigError> {
    let length = id.chars().count();
    if length == 0 || length > MAX_ID_LENGTH {
        return Err(ConfigError::IdLength(length));
    }

    if let Some(invalid) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ConfigError::InvalidId {
            id: id.to_string(),
            invalid,
        });
    }

    Ok(())
}

fn bounded<T: TryFrom<i64>>(
    field: &'static str,
    actual: i64,
    min: i64,
    max: i64,
) -> Result<T, ConfigError> {
    let out_of_range = || ConfigError::OutOfRange {
        field,
        min,
        max,
        actual,
    };

    if actual < min || actual > max {
        return Err(out_of_range());
    }
    T::try_from(actual).map_err(|_| out_of_range())
}

/// Validated, immutable adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    id: String,
    polling_interval_millis: u64,
    max_polling_errors_before_removal: u32,
    initial_counter_value: u64,
    destination_topic: String,
    advance_counter_on_publish_failure: bool,
}

impl AdapterConfig {
    /// Parse and validate a single adapter configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawAdapterConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        raw.validate()
    }

    /// Adapter identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Minimum time between two polls, in milliseconds.
    #[must_use]
    pub fn polling_interval_millis(&self) -> u64 {
        self.polling_interval_millis
    }

    /// Minimum time between two polls.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_millis)
    }

    /// Consecutive failed polls that trigger removal.
    #[must_use]
    pub fn max_polling_errors_before_removal(&self) -> u32 {
        self.max_polling_errors_before_removal
    }

    /// Counter value set on start.
    #[must_use]
    pub fn initial_counter_value(&self) -> u64 {
        self.initial_counter_value
    }

    /// Topic the samples are published to.
    #[must_use]
    pub fn destination_topic(&self) -> &str {
        &self.destination_topic
    }

    /// Whether a failed publish still advances the counter.
    #[must_use]
    pub fn advance_counter_on_publish_failure(&self) -> bool {
        self.advance_counter_on_publish_failure
    }
}

/// Parse and validate a JSON array of adapter configurations.
///
/// Identifiers must be unique across the array.
///
/// # Errors
///
/// Returns the first parse, range, or duplicate-id error.
pub fn load_adapter_configs(json: &str) -> Result<Vec<AdapterConfig>, ConfigError> {
    let raw: Vec<RawAdapterConfig> =
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut configs = Vec::with_capacity(raw.len());

    for entry in raw {
        let config = entry.validate()?;
        if !seen.insert(config.id.clone()) {
            return Err(ConfigError::DuplicateId(config.id));
        }
        configs.push(config);
    }

    tracing::debug!(count = configs.len(), "Loaded adapter configurations");

    Ok(configs)
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Identifier contains a character outside `[A-Za-z0-9_-]`
    #[error("invalid adapter id '{id}': unexpected character '{invalid}'")]
    InvalidId {
        /// Offending identifier
        id: String,
        /// First rejected character
        invalid: char,
    },
    /// Identifier is empty or longer than [`MAX_ID_LENGTH`]
    #[error("adapter id must be 1..=1024 characters, got {0}")]
    IdLength(usize),
    /// Numeric field outside its accepted range
    #[error("{field} must be in {min}..={max}, got {actual}")]
    OutOfRange {
        /// JSON field name
        field: &'static str,
        /// Smallest accepted value
        min: i64,
        /// Largest accepted value
        max: i64,
        /// Value that was supplied
        actual: i64,
    },
    /// Destination topic is empty
    #[error("destination topic must not be empty")]
    EmptyTopic,
    /// Two entries share an identifier
    #[error("duplicate adapter id: {0}")]
    DuplicateId(String),
    /// Input could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}
