//! MQTT topic-name rules for publish destinations.
//!
//! A topic *name* (as opposed to a subscription filter) must be non-empty,
//! at most 65535 bytes of UTF-8, and free of the `+`/`#` wildcards and of
//! U+0000. Topics starting with `$` are reserved for the broker.

/// Longest topic name the MQTT length prefix can carry.
pub const MAX_TOPIC_LENGTH: usize = 65_535;

/// Check that `topic` is a valid MQTT topic name to publish to.
///
/// # Errors
///
/// Returns the first rule the topic breaks.
pub fn validate_topic_name(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > MAX_TOPIC_LENGTH {
        return Err(TopicError::TooLong(topic.len()));
    }
    if topic.starts_with('$') {
        return Err(TopicError::Reserved(topic.to_string()));
    }
    if let Some(wildcard) = topic.chars().find(|c| matches!(c, '+' | '#')) {
        return Err(TopicError::Wildcard(wildcard));
    }
    if topic.contains('\0') {
        return Err(TopicError::NullCharacter);
    }

    Ok(())
}

/// Reasons a topic name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    /// Topic is empty
    #[error("topic is empty")]
    Empty,
    /// Topic exceeds [`MAX_TOPIC_LENGTH`] bytes
    #[error("topic is {0} bytes, limit is 65535")]
    TooLong(usize),
    /// Topic contains a subscription wildcard
    #[error("wildcard '{0}' not allowed in a topic name")]
    Wildcard(char),
    /// Topic contains U+0000
    #[error("topic contains a null character")]
    NullCharacter,
    /// Topic is in the broker-reserved `$` namespace
    #[error("topic '{0}' is reserved for the broker")]
    Reserved(String),
}
