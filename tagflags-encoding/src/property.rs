use nutype::nutype;
use std::fmt::Debug;

/// The width of a single property field in bits.
///
/// Fields are read through a two-word window, so they may straddle a word boundary,
/// but a single field never exceeds one word.
#[nutype(
    const_fn,
    validate(greater = 0, less_or_equal = 32),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)
)]
pub struct BitWidth(u32);

/// Small enumerations that can be stored in an [`EnumProperty`](crate::EnumProperty).
///
/// Implemented for the `#[repr(u8)]` enums in [`values`](crate::values).
/// The default variant is what an all-zero record decodes to.
pub trait EnumValue: Copy + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Tag-style names, indexed by ordinal.
    const NAMES: &'static [&'static str];

    fn ordinal(self) -> u8;

    fn from_ordinal(ordinal: u8) -> Option<Self>;

    /// Looks a variant up by its tag-style name.
    fn find(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| u8::try_from(i).ok())
            .and_then(Self::from_ordinal)
    }

    /// The number of bits needed to store every ordinal.
    fn bits() -> u32 {
        let max_ordinal = u32::try_from(Self::NAMES.len().saturating_sub(1)).unwrap_or(u32::MAX);
        (u32::BITS - max_ordinal.leading_zeros()).max(1)
    }
}

/// What a property stores and how its raw bits are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Boolean,
    /// A quantized decimal: `value = min + raw * factor`.
    ///
    /// The storable max is `min + (2^width - 1) * factor`, which may exceed `declared_max`.
    Decimal {
        factor: f64,
        min: f64,
        declared_max: Option<f64>,
    },
    Enum { names: &'static [&'static str] },
}

impl PropertyKind {
    pub const fn label(&self) -> &'static str {
        match self {
            PropertyKind::Boolean => "boolean",
            PropertyKind::Decimal { .. } => "decimal",
            PropertyKind::Enum { .. } => "enum",
        }
    }
}

/// A property to be declared in a [`RegistryBuilder`](crate::RegistryBuilder).
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    /// Raw bit width; validated at declaration time.
    pub width: u32,
    /// Direction-aware properties get two independent fields (forward and backward).
    pub direction_aware: bool,
}

impl PropertySpec {
    pub fn boolean(name: impl Into<String>, direction_aware: bool) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Boolean,
            width: 1,
            direction_aware,
        }
    }

    pub fn decimal(name: impl Into<String>, width: u32, factor: f64, direction_aware: bool) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Decimal {
                factor,
                min: 0.0,
                declared_max: None,
            },
            width,
            direction_aware,
        }
    }

    pub fn enumeration<E: EnumValue>(name: impl Into<String>, direction_aware: bool) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Enum { names: E::NAMES },
            width: E::bits(),
            direction_aware,
        }
    }

    /// Shifts the decimal range so that raw zero decodes to `min`.
    ///
    /// Has no effect on non-decimal specs.
    #[must_use]
    pub fn with_min(mut self, value: f64) -> Self {
        if let PropertyKind::Decimal { min, .. } = &mut self.kind {
            *min = value;
        }
        self
    }

    /// Declares the nominal maximum.
    /// Declaration fails if the field cannot hold it.
    #[must_use]
    pub fn with_declared_max(mut self, value: f64) -> Self {
        if let PropertyKind::Decimal { declared_max, .. } = &mut self.kind {
            *declared_max = Some(value);
        }
        self
    }
}
