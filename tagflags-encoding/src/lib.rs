//! # Bit-packed edge properties
//!
//! Routing graphs store many small, independently owned properties per edge
//! (access bits, quantized speeds, priorities, road classes, …).
//! This crate packs them into one fixed-width record of little-endian words.
//!
//! A [`RegistryBuilder`] hands out non-overlapping bit ranges for named properties.
//! Once sealed into a [`PropertyRegistry`], the layout is immutable
//! and typed handles ([`BooleanProperty`], [`DecimalProperty`], [`EnumProperty`])
//! are the only way to read or write an [`EdgeRecord`].
//!
//! The same discipline backs relation flags and turn cost records ([`TurnCostCodec`]).

// Private modules by default
mod error;
mod macros;
mod mode;
mod priority;
mod property;
mod record;
mod registry;
mod turn_cost;
pub mod values;

// Flatten the hierarchy for ergonomics; most modules only have a handful of public items.
pub use error::EncodingError;
pub use mode::{Mode, UnknownModeError};
pub use priority::PriorityCode;
pub use property::{BitWidth, BitWidthError, EnumValue, PropertyKind, PropertySpec};
pub use record::{Direction, EdgeRecord, RelationFlags, TurnRecord};
pub use registry::{
    BitRange, BooleanProperty, DecimalProperty, DescriptorInfo, EnumProperty, PropertyRegistry,
    PropertyValue, RegistryBuilder,
};
pub use turn_cost::{TurnCostCodec, TurnCostCodecBuilder, TurnCostTable, TurnKey};
