use tagflags_encoding::{EncodingError, UnknownModeError};
use thiserror::Error;

/// Errors raised while building the classifiers or classifying a single element.
///
/// [`TagParseError::InvalidNumber`] is a per-item error: the orchestrator rolls the affected mode
/// back to its defaults for that way and carries on.
#[derive(Debug, Error, PartialEq)]
pub enum TagParseError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("Tag {key}={value} is not a valid number.")]
    InvalidNumber { key: String, value: String },
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<UnknownModeError> for TagParseError {
    fn from(value: UnknownModeError) -> Self {
        TagParseError::InvalidConfig {
            reason: value.to_string(),
        }
    }
}
