use crate::eval::resolve;
use crate::{AccessState, HolidayCalendar, RestrictionType, TimeExpression};
use bitfield_struct::bitfield;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use enumset::EnumSet;
use std::sync::Arc;
use tagflags_encoding::Mode;
use zerocopy::{LE, U16, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, Unaligned};

#[bitfield(u64,
    repr = U64<LE>,
    from = bit_twiddling_helpers::conv_u64le::from_inner,
    into = bit_twiddling_helpers::conv_u64le::into_inner
)]
#[derive(PartialEq, Eq, FromBytes, IntoBytes, Immutable, Unaligned)]
struct ConditionalEntryBitField {
    #[bits(32, from = bit_twiddling_helpers::conv_u32le::from_inner, into = bit_twiddling_helpers::conv_u32le::into_inner)]
    edge_id: U32<LE>,
    #[bits(6)]
    restriction_type: RestrictionType,
    #[bits(12, from = bit_twiddling_helpers::conv_u16le::from_inner, into = bit_twiddling_helpers::conv_u16le::into_inner)]
    modes: U16<LE>,
    #[bits(1)]
    has_default: bool,
    #[bits(1)]
    default_closed: bool,
    #[bits(12)]
    _spare: u16,
}

/// A time-dependent restriction attached to one edge.
///
/// The fixed-width part (edge, type, affected modes, unconditional access) is bit-packed;
/// the parsed expression is shared with every other edge of the same way.
#[derive(Debug, Clone)]
pub struct ConditionalEntry {
    bitfield: ConditionalEntryBitField,
    expression: Arc<TimeExpression>,
    raw: Arc<str>,
}

impl ConditionalEntry {
    pub fn new(
        edge_id: u32,
        restriction_type: RestrictionType,
        modes: EnumSet<Mode>,
        default: Option<AccessState>,
        expression: Arc<TimeExpression>,
        raw: Arc<str>,
    ) -> Self {
        let bitfield = ConditionalEntryBitField::new()
            .with_edge_id(U32::new(edge_id))
            .with_restriction_type(restriction_type)
            .with_modes(U16::new(modes.as_repr()))
            .with_has_default(default.is_some())
            .with_default_closed(default == Some(AccessState::Closed));
        Self {
            bitfield,
            expression,
            raw,
        }
    }

    #[inline]
    pub fn edge_id(&self) -> u32 {
        self.bitfield.edge_id().get()
    }

    #[inline]
    pub fn restriction_type(&self) -> RestrictionType {
        self.bitfield.restriction_type()
    }

    /// The modes this restriction applies to.
    #[inline]
    pub fn modes(&self) -> EnumSet<Mode> {
        EnumSet::from_repr_truncated(self.bitfield.modes().get())
    }

    /// The access state of the way when no condition matches.
    pub fn default_state(&self) -> Option<AccessState> {
        self.bitfield.has_default().then(|| {
            if self.bitfield.default_closed() {
                AccessState::Closed
            } else {
                AccessState::Open
            }
        })
    }

    pub fn expression(&self) -> &TimeExpression {
        &self.expression
    }

    /// The clause as written in the source tag.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The packed little-endian word.
    pub fn packed(&self) -> u64 {
        self.bitfield.into_bits().get()
    }
}

/// Side table of conditional restrictions keyed by edge id.
///
/// Writers may insert concurrently while ways are classified in parallel.
#[derive(Debug, Default)]
pub struct ConditionalStore {
    entries: DashMap<u32, Vec<ConditionalEntry>>,
}

impl ConditionalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: ConditionalEntry) {
        self.entries.entry(entry.edge_id()).or_default().push(entry);
    }

    /// The number of edges with at least one entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self, edge_id: u32) -> Vec<ConditionalEntry> {
        self.entries
            .get(&edge_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Evaluates the entries of an edge that apply to `mode` at `at`.
    ///
    /// Returns `None` when the edge has no conditional restriction for `mode`.
    pub fn access_at(
        &self,
        edge_id: u32,
        mode: Mode,
        at: NaiveDateTime,
        calendar: &dyn HolidayCalendar,
    ) -> Option<AccessState> {
        let entries = self.entries.get(&edge_id)?;
        let relevant: Vec<&ConditionalEntry> = entries
            .iter()
            .filter(|entry| entry.modes().contains(mode))
            .collect();
        if relevant.is_empty() {
            return None;
        }
        let default = relevant.iter().find_map(|entry| entry.default_state());
        Some(resolve(
            relevant
                .iter()
                .map(|entry| (entry.restriction_type(), entry.expression())),
            at,
            calendar,
            default,
        ))
    }

    pub fn is_restricted(
        &self,
        edge_id: u32,
        mode: Mode,
        at: NaiveDateTime,
        calendar: &dyn HolidayCalendar,
    ) -> bool {
        self.access_at(edge_id, mode, at, calendar) == Some(AccessState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConditionalEntry, ConditionalStore};
    use crate::{AccessState, NoHolidays, RestrictionType, TimeExpression};
    use chrono::{NaiveDate, NaiveDateTime};
    use enumset::EnumSet;
    use proptest::prelude::*;
    use std::sync::Arc;
    use tagflags_encoding::Mode;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, month, day)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    fn entry(
        edge_id: u32,
        restriction_type: RestrictionType,
        modes: EnumSet<Mode>,
        default: Option<AccessState>,
        expression: &str,
    ) -> ConditionalEntry {
        ConditionalEntry::new(
            edge_id,
            restriction_type,
            modes,
            default,
            Arc::new(TimeExpression::parse(expression).expect("valid")),
            Arc::from(expression),
        )
    }

    #[test]
    fn packed_layout() {
        let entry = entry(
            0x0102_0304,
            RestrictionType::TimedDenied,
            Mode::Car | Mode::Bus,
            Some(AccessState::Closed),
            "Mo-Fr",
        );
        assert_eq!(entry.edge_id(), 0x0102_0304);
        assert_eq!(entry.restriction_type(), RestrictionType::TimedDenied);
        assert_eq!(entry.modes(), Mode::Car | Mode::Bus);
        assert_eq!(entry.default_state(), Some(AccessState::Closed));
        // edge id in the low word, type at bit 32, modes at bit 38, default flags at 50 and 51
        let modes = u64::from((Mode::Car | Mode::Bus).as_repr());
        assert_eq!(
            entry.packed(),
            0x0102_0304 | (7 << 32) | (modes << 38) | (1 << 50) | (1 << 51)
        );
    }

    #[test]
    fn evaluates_only_the_requested_mode() {
        let store = ConditionalStore::new();
        store.insert(entry(
            3,
            RestrictionType::TimedDenied,
            EnumSet::from(Mode::Car),
            None,
            "Nov-May",
        ));
        store.insert(entry(
            3,
            RestrictionType::TimedAllowed,
            EnumSet::from(Mode::Bike),
            Some(AccessState::Closed),
            "Sa-Su",
        ));

        assert_eq!(store.len(), 1);
        assert_eq!(store.entries(3).len(), 2);
        assert!(store.is_restricted(3, Mode::Car, at(1, 6, 12), &NoHolidays));
        assert!(!store.is_restricted(3, Mode::Car, at(7, 6, 12), &NoHolidays));
        // June 6th 2020 is a Saturday
        assert_eq!(
            store.access_at(3, Mode::Bike, at(6, 6, 12), &NoHolidays),
            Some(AccessState::Open)
        );
        assert_eq!(
            store.access_at(3, Mode::Bike, at(6, 8, 12), &NoHolidays),
            Some(AccessState::Closed)
        );
        assert_eq!(store.access_at(3, Mode::Foot, at(6, 8, 12), &NoHolidays), None);
        assert_eq!(store.access_at(4, Mode::Car, at(6, 8, 12), &NoHolidays), None);
    }

    proptest! {
        #[test]
        fn prop_bitfield_preserves_fields(
            edge_id in any::<u32>(),
            denied in any::<bool>(),
            mode_bits in 0u16..(1 << 10),
            default in prop::option::of(any::<bool>()),
        ) {
            let modes = EnumSet::<Mode>::from_repr_truncated(mode_bits);
            let restriction_type = if denied { RestrictionType::TimedDenied } else { RestrictionType::TimedAllowed };
            let default = default.map(|closed| if closed { AccessState::Closed } else { AccessState::Open });
            let entry = entry(edge_id, restriction_type, modes, default, "Jan");
            prop_assert_eq!(entry.edge_id(), edge_id);
            prop_assert_eq!(entry.restriction_type(), restriction_type);
            prop_assert_eq!(entry.modes(), modes);
            prop_assert_eq!(entry.default_state(), default);
        }
    }
}
