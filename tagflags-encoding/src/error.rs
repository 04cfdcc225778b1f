use thiserror::Error;

/// Errors raised while declaring properties or encoding values.
///
/// Declaration errors (duplicates, overlaps, bad widths or factors) are configuration errors
/// and are expected to abort startup.
/// [`EncodingError::OutOfRange`] is returned to classifiers so they can clamp deliberately.
#[derive(Debug, Error, PartialEq)]
pub enum EncodingError {
    #[error("Property {name} is declared more than once.")]
    DuplicateName { name: String },
    #[error("Property {name} (bits {start}..{end}) overlaps property {other}.")]
    Overlap {
        name: String,
        other: String,
        start: u32,
        end: u32,
    },
    #[error("Property {name} has an invalid bit width of {width} (expected 1..=32).")]
    InvalidWidth { name: String, width: u32 },
    #[error("Property {name} has an illegal factor/range combination: {reason}")]
    InvalidFactor { name: String, reason: String },
    #[error("Value {value} is outside the storable range [{min}, {max}] of {name}.")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("No property named {name} is registered.")]
    UnknownProperty { name: String },
    #[error("Property {name} is not a {expected} property.")]
    KindMismatch { name: String, expected: &'static str },
    #[error("Ordinal {ordinal} is not a valid value of {name}.")]
    InvalidEnumOrdinal { name: String, ordinal: u32 },
    #[error("Record has {actual} bytes, but the layout requires {expected}.")]
    RecordLength { expected: usize, actual: usize },
}
