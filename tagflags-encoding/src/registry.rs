use crate::property::{BitWidth, EnumValue, PropertyKind, PropertySpec};
use crate::{Direction, EdgeRecord, EncodingError};
use bit_set::BitSet;
use bit_twiddling_helpers::words::{low_mask, words_for_bits};
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A contiguous range of bits inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BitRange {
    pub offset: u32,
    pub width: u32,
}

impl BitRange {
    /// One past the last bit of the range.
    #[inline]
    pub const fn end(&self) -> u32 {
        self.offset + self.width
    }

    /// The largest raw value the range can hold.
    #[inline]
    pub const fn raw_max(&self) -> u32 {
        // Width is at most 32, so this always fits
        #[allow(clippy::cast_possible_truncation)]
        let max = low_mask(self.width) as u32;
        max
    }

    fn bits(&self) -> impl Iterator<Item = usize> {
        (self.offset..self.end()).map(|bit| bit as usize)
    }
}

/// A declared property: its name, kind and allocated bit range(s).
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorInfo {
    name: Arc<str>,
    kind: PropertyKind,
    forward: BitRange,
    backward: Option<BitRange>,
}

impl DescriptorInfo {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    #[inline]
    pub fn forward_range(&self) -> BitRange {
        self.forward
    }

    /// The independent backward range of a direction-aware property.
    #[inline]
    pub fn backward_range(&self) -> Option<BitRange> {
        self.backward
    }

    #[inline]
    pub fn is_direction_aware(&self) -> bool {
        self.backward.is_some()
    }

    /// All ranges claimed by this property.
    pub fn ranges(&self) -> impl Iterator<Item = BitRange> + '_ {
        std::iter::once(self.forward).chain(self.backward)
    }

    /// Total number of bits claimed by this property.
    pub fn total_bits(&self) -> u32 {
        self.ranges().map(|r| r.width).sum()
    }

    fn range_for(&self, direction: Direction) -> BitRange {
        match (direction, self.backward) {
            (Direction::Backward, Some(range)) => range,
            _ => self.forward,
        }
    }

    fn decode(&self, record: &EdgeRecord, direction: Direction) -> PropertyValue {
        let range = self.range_for(direction);
        let raw = record.read(range.offset, range.width);
        match &self.kind {
            PropertyKind::Boolean => PropertyValue::Boolean(raw != 0),
            PropertyKind::Decimal { factor, min, .. } => {
                PropertyValue::Decimal(min + f64::from(raw) * factor)
            }
            PropertyKind::Enum { names } => PropertyValue::Enum(
                usize::try_from(raw)
                    .ok()
                    .and_then(|i| names.get(i))
                    .copied()
                    .unwrap_or("invalid"),
            ),
        }
    }
}

/// A dynamically typed, decoded property value (for inspection tooling).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
pub enum PropertyValue {
    Boolean(bool),
    Decimal(f64),
    Enum(&'static str),
}

/// Collects property declarations and allocates their bit ranges.
///
/// Allocation is append-only: each auto-placed property starts at the first bit
/// after everything declared so far (forward range first, then backward).
/// Properties may also be pinned to an explicit offset with [`RegistryBuilder::declare_at`];
/// overlapping claims are rejected immediately.
#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: Vec<DescriptorInfo>,
    names: HashMap<Arc<str>, usize>,
    occupied: BitSet,
    next_free: u32,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a property at the next free offset.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name, an invalid width,
    /// or an illegal factor/range combination for decimals.
    pub fn declare(&mut self, spec: PropertySpec) -> Result<DescriptorInfo, EncodingError> {
        let offset = self.next_free;
        self.declare_at(spec, offset)
    }

    /// Declares a property whose forward range starts at `offset`.
    /// The backward range (if any) immediately follows it.
    ///
    /// # Errors
    ///
    /// In addition to the checks of [`RegistryBuilder::declare`],
    /// this fails if any claimed bit is already owned by another property.
    pub fn declare_at(
        &mut self,
        spec: PropertySpec,
        offset: u32,
    ) -> Result<DescriptorInfo, EncodingError> {
        if self.names.contains_key(spec.name.as_str()) {
            return Err(EncodingError::DuplicateName { name: spec.name });
        }

        let width = BitWidth::try_new(spec.width)
            .map_err(|_| EncodingError::InvalidWidth {
                name: spec.name.clone(),
                width: spec.width,
            })?
            .into_inner();

        let forward = BitRange { offset, width };
        let backward = spec.direction_aware.then_some(BitRange {
            offset: forward.end(),
            width,
        });

        if let PropertyKind::Decimal {
            factor,
            min,
            declared_max,
        } = spec.kind
        {
            validate_decimal(&spec.name, factor, min, declared_max, forward.raw_max())?;
        }

        let info = DescriptorInfo {
            name: Arc::from(spec.name.as_str()),
            kind: spec.kind,
            forward,
            backward,
        };

        for range in info.ranges() {
            if let Some(bit) = range.bits().find(|bit| self.occupied.contains(*bit)) {
                let other = self
                    .owner_of(bit)
                    .map_or_else(|| "<unknown>".to_string(), |d| d.name.to_string());
                return Err(EncodingError::Overlap {
                    name: spec.name,
                    other,
                    start: range.offset,
                    end: range.end(),
                });
            }
        }

        for range in info.ranges() {
            for bit in range.bits() {
                self.occupied.insert(bit);
            }
            self.next_free = self.next_free.max(range.end());
        }

        debug!(
            name = info.name(),
            kind = info.kind.label(),
            offset,
            width,
            direction_aware = spec.direction_aware,
            "Declared property"
        );

        self.names.insert(info.name.clone(), self.descriptors.len());
        self.descriptors.push(info.clone());
        Ok(info)
    }

    /// # Errors
    ///
    /// See [`RegistryBuilder::declare`].
    pub fn declare_boolean(
        &mut self,
        name: impl Into<String>,
        direction_aware: bool,
    ) -> Result<BooleanProperty, EncodingError> {
        BooleanProperty::try_from(&self.declare(PropertySpec::boolean(name, direction_aware))?)
    }

    /// # Errors
    ///
    /// See [`RegistryBuilder::declare`].
    pub fn declare_decimal(&mut self, spec: PropertySpec) -> Result<DecimalProperty, EncodingError> {
        DecimalProperty::try_from(&self.declare(spec)?)
    }

    /// # Errors
    ///
    /// See [`RegistryBuilder::declare`].
    pub fn declare_enum<E: EnumValue>(
        &mut self,
        name: impl Into<String>,
        direction_aware: bool,
    ) -> Result<EnumProperty<E>, EncodingError> {
        EnumProperty::try_from(&self.declare(PropertySpec::enumeration::<E>(
            name,
            direction_aware,
        ))?)
    }

    /// Seals the layout. The resulting registry is immutable.
    pub fn seal(self) -> PropertyRegistry {
        let bits = self.next_free;
        PropertyRegistry {
            descriptors: self.descriptors,
            names: self.names,
            bits,
            size_words: words_for_bits(bits),
        }
    }

    fn owner_of(&self, bit: usize) -> Option<&DescriptorInfo> {
        self.descriptors
            .iter()
            .find(|d| d.ranges().any(|r| r.bits().any(|b| b == bit)))
    }
}

fn validate_decimal(
    name: &str,
    factor: f64,
    min: f64,
    declared_max: Option<f64>,
    raw_max: u32,
) -> Result<(), EncodingError> {
    let invalid = |reason: String| EncodingError::InvalidFactor {
        name: name.to_string(),
        reason,
    };

    if !factor.is_finite() || factor <= 0.0 {
        return Err(invalid(format!("factor {factor} must be positive and finite")));
    }
    if !min.is_finite() {
        return Err(invalid(format!("minimum {min} must be finite")));
    }
    let storable_max = min + f64::from(raw_max) * factor;
    if let Some(max) = declared_max
        && (!max.is_finite() || max > storable_max || max < min)
    {
        return Err(invalid(format!(
            "declared maximum {max} does not fit in [{min}, {storable_max}]"
        )));
    }
    Ok(())
}

/// An immutable, sealed property layout.
///
/// Registries are built single-threaded and then shared by reference between workers.
pub struct PropertyRegistry {
    descriptors: Vec<DescriptorInfo>,
    names: HashMap<Arc<str>, usize>,
    bits: u32,
    size_words: usize,
}

impl PropertyRegistry {
    /// The fixed record length in words.
    #[inline]
    pub fn size_words(&self) -> usize {
        self.size_words
    }

    /// The number of allocated bits.
    #[inline]
    pub fn bits_used(&self) -> u32 {
        self.bits
    }

    /// Creates a zeroed record with this registry's layout.
    pub fn create_record(&self) -> EdgeRecord {
        EdgeRecord::zeroed(self.size_words)
    }

    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> &[DescriptorInfo] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&DescriptorInfo> {
        self.names.get(name).map(|i| &self.descriptors[*i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    fn lookup(&self, name: &str) -> Result<&DescriptorInfo, EncodingError> {
        self.get(name).ok_or_else(|| EncodingError::UnknownProperty {
            name: name.to_string(),
        })
    }

    /// # Errors
    ///
    /// Fails if no property has this name or if it is not a boolean.
    pub fn boolean(&self, name: &str) -> Result<BooleanProperty, EncodingError> {
        BooleanProperty::try_from(self.lookup(name)?)
    }

    /// # Errors
    ///
    /// Fails if no property has this name or if it is not a decimal.
    pub fn decimal(&self, name: &str) -> Result<DecimalProperty, EncodingError> {
        DecimalProperty::try_from(self.lookup(name)?)
    }

    /// # Errors
    ///
    /// Fails if no property has this name or if it is not an enum of type `E`.
    pub fn enumeration<E: EnumValue>(&self, name: &str) -> Result<EnumProperty<E>, EncodingError> {
        EnumProperty::try_from(self.lookup(name)?)
    }

    /// Zeroes every property whose name starts with `prefix` (e.g. `bike.`).
    ///
    /// Used to roll a mode back to its defaults after a failed classification
    /// without touching any other namespace.
    pub fn reset_namespace(&self, record: &mut EdgeRecord, prefix: &str) {
        for descriptor in self.descriptors.iter().filter(|d| d.name.starts_with(prefix)) {
            for range in descriptor.ranges() {
                record.write(range.offset, range.width, 0);
            }
        }
    }

    /// Decodes every property for one direction, in declaration order.
    pub fn decode(&self, record: &EdgeRecord, direction: Direction) -> Vec<(&str, PropertyValue)> {
        self.descriptors
            .iter()
            .map(|d| (d.name(), d.decode(record, direction)))
            .collect()
    }
}

impl Debug for PropertyRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("size_words", &self.size_words)
            .field("bits", &self.bits)
            .field(
                "descriptors",
                &self.descriptors.iter().map(|d| d.name()).join(", "),
            )
            .finish()
    }
}

fn kind_mismatch(info: &DescriptorInfo, expected: &'static str) -> EncodingError {
    EncodingError::KindMismatch {
        name: info.name.to_string(),
        expected,
    }
}

/// A one-bit property.
///
/// A direction-shared boolean has a single bit for both directions:
/// writing different values for forward and backward simply keeps the last write.
/// Keeping them consistent is up to the caller.
#[derive(Debug, Clone)]
pub struct BooleanProperty {
    name: Arc<str>,
    forward: BitRange,
    backward: Option<BitRange>,
}

impl TryFrom<&DescriptorInfo> for BooleanProperty {
    type Error = EncodingError;

    fn try_from(info: &DescriptorInfo) -> Result<Self, Self::Error> {
        match info.kind {
            PropertyKind::Boolean => Ok(Self {
                name: info.name.clone(),
                forward: info.forward,
                backward: info.backward,
            }),
            _ => Err(kind_mismatch(info, "boolean")),
        }
    }
}

impl BooleanProperty {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_direction_aware(&self) -> bool {
        self.backward.is_some()
    }

    #[inline]
    fn range(&self, direction: Direction) -> BitRange {
        match (direction, self.backward) {
            (Direction::Backward, Some(range)) => range,
            _ => self.forward,
        }
    }

    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    #[inline]
    pub fn get(&self, direction: Direction, record: &EdgeRecord) -> bool {
        let range = self.range(direction);
        record.read(range.offset, range.width) != 0
    }

    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    #[inline]
    pub fn set(&self, direction: Direction, record: &mut EdgeRecord, value: bool) {
        let range = self.range(direction);
        record.write(range.offset, range.width, u32::from(value));
    }
}

/// A quantized decimal property: `value = min + raw * factor`.
#[derive(Debug, Clone)]
pub struct DecimalProperty {
    name: Arc<str>,
    forward: BitRange,
    backward: Option<BitRange>,
    factor: f64,
    min: f64,
}

impl TryFrom<&DescriptorInfo> for DecimalProperty {
    type Error = EncodingError;

    fn try_from(info: &DescriptorInfo) -> Result<Self, Self::Error> {
        match info.kind {
            PropertyKind::Decimal { factor, min, .. } => Ok(Self {
                name: info.name.clone(),
                forward: info.forward,
                backward: info.backward,
                factor,
                min,
            }),
            _ => Err(kind_mismatch(info, "decimal")),
        }
    }
}

impl DecimalProperty {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_direction_aware(&self) -> bool {
        self.backward.is_some()
    }

    /// The quantum (resolution) of this property.
    #[inline]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    #[inline]
    pub fn min_storable(&self) -> f64 {
        self.min
    }

    /// The largest value the field can hold (`min + (2^width - 1) * factor`).
    ///
    /// This is usually a bit larger than the nominal maximum the property was declared with.
    #[inline]
    pub fn max_storable(&self) -> f64 {
        self.decode_raw(self.forward.raw_max())
    }

    /// The value that would actually be stored for `value` (rounded to the nearest quantum).
    pub fn next_storable_value(&self, value: f64) -> f64 {
        self.min + ((value - self.min) / self.factor).round() * self.factor
    }

    #[inline]
    fn decode_raw(&self, raw: u32) -> f64 {
        self.min + f64::from(raw) * self.factor
    }

    #[inline]
    fn range(&self, direction: Direction) -> BitRange {
        match (direction, self.backward) {
            (Direction::Backward, Some(range)) => range,
            _ => self.forward,
        }
    }

    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    #[inline]
    pub fn get(&self, direction: Direction, record: &EdgeRecord) -> f64 {
        let range = self.range(direction);
        self.decode_raw(record.read(range.offset, range.width))
    }

    /// Rounds `value` to the nearest quantum and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::OutOfRange`] if the rounded value is not storable
    /// (including NaN and infinities). The record is left untouched in that case.
    ///
    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    pub fn set(
        &self,
        direction: Direction,
        record: &mut EdgeRecord,
        value: f64,
    ) -> Result<(), EncodingError> {
        let range = self.range(direction);
        let raw = ((value - self.min) / self.factor).round();
        if !raw.is_finite() || raw < 0.0 || raw > f64::from(range.raw_max()) {
            return Err(EncodingError::OutOfRange {
                name: self.name.to_string(),
                value,
                min: self.min,
                max: self.max_storable(),
            });
        }
        record.write(range.offset, range.width, raw_from_checked(raw));
        Ok(())
    }

    /// Clamps `value` into the storable range before storing it; returns what was stored.
    /// NaN is stored as the minimum.
    ///
    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    pub fn set_clamped(&self, direction: Direction, record: &mut EdgeRecord, value: f64) -> f64 {
        let range = self.range(direction);
        let raw = ((value - self.min) / self.factor)
            .round()
            .clamp(0.0, f64::from(range.raw_max()));
        let raw = if raw.is_nan() { 0 } else { raw_from_checked(raw) };
        record.write(range.offset, range.width, raw);
        self.decode_raw(raw)
    }
}

/// Converts an already range-checked, integral float into a raw field value.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn raw_from_checked(raw: f64) -> u32 {
    raw as u32
}

/// A small enumeration property.
#[derive(Debug, Clone)]
pub struct EnumProperty<E: EnumValue> {
    name: Arc<str>,
    forward: BitRange,
    backward: Option<BitRange>,
    _marker: PhantomData<E>,
}

impl<E: EnumValue> TryFrom<&DescriptorInfo> for EnumProperty<E> {
    type Error = EncodingError;

    fn try_from(info: &DescriptorInfo) -> Result<Self, Self::Error> {
        match info.kind {
            PropertyKind::Enum { names } if names == E::NAMES => Ok(Self {
                name: info.name.clone(),
                forward: info.forward,
                backward: info.backward,
                _marker: PhantomData,
            }),
            _ => Err(kind_mismatch(info, "enum")),
        }
    }
}

impl<E: EnumValue> EnumProperty<E> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn range(&self, direction: Direction) -> BitRange {
        match (direction, self.backward) {
            (Direction::Backward, Some(range)) => range,
            _ => self.forward,
        }
    }

    /// Decodes the stored variant, falling back to the default variant for unknown ordinals.
    ///
    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    #[inline]
    pub fn get(&self, direction: Direction, record: &EdgeRecord) -> E {
        self.try_get(direction, record).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Fails if the stored ordinal does not name a variant (e.g. a corrupted record).
    ///
    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    pub fn try_get(&self, direction: Direction, record: &EdgeRecord) -> Result<E, EncodingError> {
        let range = self.range(direction);
        let raw = record.read(range.offset, range.width);
        u8::try_from(raw)
            .ok()
            .and_then(E::from_ordinal)
            .ok_or_else(|| EncodingError::InvalidEnumOrdinal {
                name: self.name.to_string(),
                ordinal: raw,
            })
    }

    /// # Panics
    ///
    /// Panics if `record` was created by a smaller registry.
    #[inline]
    pub fn set(&self, direction: Direction, record: &mut EdgeRecord, value: E) {
        let range = self.range(direction);
        record.write(range.offset, range.width, u32::from(value.ordinal()));
    }
}

#[cfg(test)]
mod tests {
    use super::{PropertyValue, RegistryBuilder};
    use crate::values::{RouteNetwork, Surface};
    use crate::{Direction, EncodingError, PropertySpec};
    use proptest::prelude::*;

    #[test]
    fn duplicate_names_fail_fast() {
        let mut builder = RegistryBuilder::new();
        builder.declare_boolean("car.access", true).expect("first");
        assert_eq!(
            builder.declare_boolean("car.access", true).err(),
            Some(EncodingError::DuplicateName {
                name: "car.access".to_string()
            })
        );
    }

    #[test]
    fn pinned_overlap_fails_at_declare() {
        let mut builder = RegistryBuilder::new();
        builder
            .declare_decimal(PropertySpec::decimal("car.average_speed", 5, 5.0, true))
            .expect("declare");
        let err = builder
            .declare_at(PropertySpec::boolean("bike.access", false), 7)
            .expect_err("bit 7 belongs to the backward speed field");
        assert!(matches!(
            err,
            EncodingError::Overlap { ref other, .. } if other == "car.average_speed"
        ));

        // Right after the last field is fine
        builder
            .declare_at(PropertySpec::boolean("bike.access", false), 10)
            .expect("free range");
    }

    #[test]
    fn illegal_decimal_combinations() {
        let mut builder = RegistryBuilder::new();
        assert!(matches!(
            builder.declare(PropertySpec::decimal("a", 4, 0.0, false)),
            Err(EncodingError::InvalidFactor { .. })
        ));
        assert!(matches!(
            builder.declare(PropertySpec::decimal("b", 4, 2.0, false).with_declared_max(31.0)),
            Err(EncodingError::InvalidFactor { .. })
        ));
        assert!(matches!(
            builder.declare(PropertySpec::decimal("c", 40, 1.0, false)),
            Err(EncodingError::InvalidWidth { width: 40, .. })
        ));
        // Nothing was allocated by the failed declarations
        assert_eq!(builder.seal().bits_used(), 0);
    }

    #[test]
    fn storable_max_exceeds_declared_max() {
        let mut builder = RegistryBuilder::new();
        let speed = builder
            .declare_decimal(
                PropertySpec::decimal("bike.average_speed", 4, 2.0, true).with_declared_max(29.0),
            )
            .expect("declare");
        let registry = builder.seal();
        let mut record = registry.create_record();

        assert!((speed.max_storable() - 30.0).abs() < f64::EPSILON);
        speed
            .set(Direction::Forward, &mut record, 30.0)
            .expect("30 is storable even though 29 was declared");
        assert!(matches!(
            speed.set(Direction::Forward, &mut record, 31.5),
            Err(EncodingError::OutOfRange { .. })
        ));
        assert!(speed.set(Direction::Forward, &mut record, f64::NAN).is_err());
        // The failed writes left the old value in place
        assert!((speed.get(Direction::Forward, &record) - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clamped_writes() {
        let mut builder = RegistryBuilder::new();
        let cost = builder
            .declare_decimal(PropertySpec::decimal("turn_cost", 2, 1.0, false))
            .expect("declare");
        let registry = builder.seal();
        let mut record = registry.create_record();
        assert!((cost.set_clamped(Direction::Forward, &mut record, 10.0) - 3.0).abs() < 1e-9);
        assert!(cost.set_clamped(Direction::Forward, &mut record, -1.0).abs() < 1e-9);
    }

    #[test]
    fn signed_decimal() {
        let mut builder = RegistryBuilder::new();
        let slope = builder
            .declare_decimal(PropertySpec::decimal("average_slope", 6, 1.0, false).with_min(-31.0))
            .expect("declare");
        let registry = builder.seal();
        let mut record = registry.create_record();
        slope
            .set(Direction::Forward, &mut record, -12.4)
            .expect("storable");
        assert!((slope.get(Direction::Forward, &record) + 12.0).abs() < 1e-9);
        assert!((slope.max_storable() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn typed_lookup_checks_kind() {
        let mut builder = RegistryBuilder::new();
        builder
            .declare_enum::<Surface>("surface", false)
            .expect("declare");
        let registry = builder.seal();
        assert!(registry.enumeration::<Surface>("surface").is_ok());
        assert!(matches!(
            registry.enumeration::<RouteNetwork>("surface"),
            Err(EncodingError::KindMismatch { .. })
        ));
        assert!(matches!(
            registry.boolean("surface"),
            Err(EncodingError::KindMismatch { .. })
        ));
        assert!(matches!(
            registry.decimal("nope"),
            Err(EncodingError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn reset_namespace_only_touches_prefix() {
        let mut builder = RegistryBuilder::new();
        let car = builder.declare_boolean("car.access", true).expect("declare");
        let bike = builder.declare_boolean("bike.access", true).expect("declare");
        let registry = builder.seal();
        let mut record = registry.create_record();
        for direction in Direction::BOTH {
            car.set(direction, &mut record, true);
            bike.set(direction, &mut record, true);
        }

        registry.reset_namespace(&mut record, "bike.");

        assert!(car.get(Direction::Forward, &record));
        assert!(car.get(Direction::Backward, &record));
        assert!(!bike.get(Direction::Forward, &record));
        assert!(!bike.get(Direction::Backward, &record));
    }

    #[test]
    fn layout_snapshot() {
        let mut builder = RegistryBuilder::new();
        builder.declare_boolean("car.access", true).expect("declare");
        builder
            .declare_decimal(PropertySpec::decimal("car.average_speed", 7, 2.0, true))
            .expect("declare");
        builder
            .declare_enum::<RouteNetwork>("bike_network", false)
            .expect("declare");
        let registry = builder.seal();
        assert_eq!(registry.bits_used(), 2 + 14 + 3);
        assert_eq!(registry.size_words(), 1);

        let record = registry.create_record();
        assert_eq!(
            registry.decode(&record, Direction::Backward),
            vec![
                ("car.access", PropertyValue::Boolean(false)),
                ("car.average_speed", PropertyValue::Decimal(0.0)),
                ("bike_network", PropertyValue::Enum("missing")),
            ]
        );

        if !cfg!(miri) {
            insta::assert_debug_snapshot!("small_layout", registry.descriptors());
        }
    }

    fn arbitrary_specs() -> impl Strategy<Value = Vec<(u32, bool)>> {
        proptest::collection::vec((1u32..=32, any::<bool>()), 1..40)
    }

    proptest! {
        /// Auto-allocated layouts always seal, never overlap, and cover exactly the used bits.
        #[test]
        fn prop_partition(specs in arbitrary_specs()) {
            let mut builder = RegistryBuilder::new();
            for (i, (width, direction_aware)) in specs.iter().enumerate() {
                builder
                    .declare(PropertySpec::decimal(format!("p{i}"), *width, 1.0, *direction_aware))
                    .expect("non-conflicting declarations always succeed");
            }
            let registry = builder.seal();

            let mut ranges: Vec<_> = registry
                .descriptors()
                .iter()
                .flat_map(|d| d.ranges().collect::<Vec<_>>())
                .collect();
            ranges.sort_by_key(|r| r.offset);
            let mut cursor = 0;
            for range in &ranges {
                prop_assert_eq!(range.offset, cursor, "gap or overlap at {}", cursor);
                cursor = range.end();
            }
            prop_assert_eq!(cursor, registry.bits_used());
            prop_assert!(registry.size_words() * 32 >= registry.bits_used() as usize);
        }

        /// Pinning a property onto any already-claimed bit must fail.
        #[test]
        fn prop_forced_overlap_fails(specs in arbitrary_specs(), pick in any::<proptest::sample::Index>()) {
            let mut builder = RegistryBuilder::new();
            for (i, (width, direction_aware)) in specs.iter().enumerate() {
                builder
                    .declare(PropertySpec::decimal(format!("p{i}"), *width, 1.0, *direction_aware))
                    .expect("declare");
            }
            let used = builder.next_free;
            let offset = u32::try_from(pick.index(used as usize)).expect("small");
            let result = builder.declare_at(PropertySpec::boolean("intruder", false), offset);
            let is_overlap = matches!(result, Err(EncodingError::Overlap { .. }));
            prop_assert!(is_overlap);
        }

        /// get(set(x)) == next_storable_value(x) within the storable range.
        #[test]
        fn prop_decimal_roundtrip(width in 1u32..=16, factor in 0.01f64..10.0, fraction in 0.0f64..=1.0) {
            let mut builder = RegistryBuilder::new();
            let property = builder
                .declare_decimal(PropertySpec::decimal("x", width, factor, false))
                .expect("declare");
            let registry = builder.seal();
            let mut record = registry.create_record();

            let value = fraction * property.max_storable();
            property.set(Direction::Forward, &mut record, value).expect("in range");
            let stored = property.get(Direction::Forward, &record);
            prop_assert!((stored - property.next_storable_value(value)).abs() < 1e-9);
        }

        /// Writing one direction never changes the other.
        #[test]
        fn prop_direction_independence(
            forward in 0u8..6,
            backward in 0u8..6,
            flag_fwd: bool,
            flag_bwd: bool,
            speed_fwd in 0.0f64..60.0,
            speed_bwd in 0.0f64..60.0,
        ) {
            let mut builder = RegistryBuilder::new();
            let flag = builder.declare_boolean("flag", true).expect("declare");
            let speed = builder
                .declare_decimal(PropertySpec::decimal("speed", 5, 2.0, true))
                .expect("declare");
            let network = builder
                .declare_enum::<RouteNetwork>("network", true)
                .expect("declare");
            let registry = builder.seal();
            let mut record = registry.create_record();

            let fwd_network = RouteNetwork::from_ordinal_or_default(forward);
            let bwd_network = RouteNetwork::from_ordinal_or_default(backward);

            flag.set(Direction::Backward, &mut record, flag_bwd);
            speed.set(Direction::Backward, &mut record, speed_bwd).expect("storable");
            network.set(Direction::Backward, &mut record, bwd_network);

            flag.set(Direction::Forward, &mut record, flag_fwd);
            speed.set(Direction::Forward, &mut record, speed_fwd).expect("storable");
            network.set(Direction::Forward, &mut record, fwd_network);

            prop_assert_eq!(flag.get(Direction::Backward, &record), flag_bwd);
            prop_assert!((speed.get(Direction::Backward, &record) - speed.next_storable_value(speed_bwd)).abs() < 1e-9);
            prop_assert_eq!(network.get(Direction::Backward, &record), bwd_network);
            prop_assert_eq!(flag.get(Direction::Forward, &record), flag_fwd);
            prop_assert!((speed.get(Direction::Forward, &record) - speed.next_storable_value(speed_fwd)).abs() < 1e-9);
            prop_assert_eq!(network.get(Direction::Forward, &record), fwd_network);
        }
    }
}
