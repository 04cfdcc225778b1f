use thiserror::Error;

/// Errors raised while parsing a conditional restriction.
///
/// These are per-item tagging errors: callers skip the offending condition and keep going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionalParseError {
    #[error("Unexpected token {found:?} at position {position}.")]
    UnexpectedToken { found: String, position: usize },
    #[error("Unexpected end of expression.")]
    UnexpectedEnd,
    #[error("Invalid date: {reason}")]
    InvalidDate { reason: String },
    #[error("Invalid time of day: {value}")]
    InvalidTime { value: String },
    #[error("Invalid ISO week number: {week}")]
    InvalidWeek { week: u32 },
    #[error("Unknown word {word:?} at position {position}.")]
    UnknownWord { word: String, position: usize },
    #[error("Missing `@` between value and condition in {clause:?}.")]
    MissingSeparator { clause: String },
}
