use crate::{
    BooleanProperty, DecimalProperty, Direction, EncodingError, Mode, PropertyRegistry,
    PropertySpec, RegistryBuilder, TurnRecord,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Identifies a turn: entering `via_node` on `from_edge` and leaving on `to_edge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnKey {
    pub via_node: u64,
    pub from_edge: u32,
    pub to_edge: u32,
}

#[derive(Debug, Clone)]
struct TurnProperties {
    restricted: BooleanProperty,
    cost: DecimalProperty,
    max_cost: u32,
}

/// Declares per-mode turn restriction bits and capped costs in their own record layout.
#[derive(Default)]
pub struct TurnCostCodecBuilder {
    registry: RegistryBuilder,
    modes: HashMap<Mode, TurnProperties>,
}

impl TurnCostCodecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the turn properties of `mode`, returning the width of the cost field.
    ///
    /// The cost field is just wide enough to hold `max_turn_costs` whole units.
    ///
    /// # Errors
    ///
    /// Fails if `mode` was already declared.
    pub fn declare(&mut self, mode: Mode, max_turn_costs: u32) -> Result<u32, EncodingError> {
        let width = (u32::BITS - max_turn_costs.leading_zeros()).max(1);
        let restricted = self
            .registry
            .declare_boolean(mode.key("turn_restricted"), false)?;
        let cost = self.registry.declare_decimal(
            PropertySpec::decimal(mode.key("turn_cost"), width, 1.0, false)
                .with_declared_max(f64::from(max_turn_costs)),
        )?;
        self.modes.insert(
            mode,
            TurnProperties {
                restricted,
                cost,
                max_cost: max_turn_costs,
            },
        );
        Ok(width)
    }

    pub fn build(self) -> TurnCostCodec {
        TurnCostCodec {
            registry: self.registry.seal(),
            modes: self.modes,
        }
    }
}

/// Reads and writes the per-mode turn data of a [`TurnRecord`].
///
/// All declared modes share one record without colliding.
pub struct TurnCostCodec {
    registry: PropertyRegistry,
    modes: HashMap<Mode, TurnProperties>,
}

impl TurnCostCodec {
    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    pub fn create_record(&self) -> TurnRecord {
        self.registry.create_record()
    }

    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        self.modes.keys().copied()
    }

    fn properties(&self, mode: Mode) -> Result<&TurnProperties, EncodingError> {
        self.modes
            .get(&mode)
            .ok_or_else(|| EncodingError::UnknownProperty {
                name: mode.key("turn_cost"),
            })
    }

    /// The largest cost that can be stored for `mode`.
    ///
    /// # Errors
    ///
    /// Fails if `mode` has no turn properties.
    pub fn max_cost(&self, mode: Mode) -> Result<f64, EncodingError> {
        Ok(f64::from(self.properties(mode)?.max_cost))
    }

    /// Creates a fresh record carrying only `mode`'s turn data.
    ///
    /// # Errors
    ///
    /// Fails if `mode` has no turn properties.
    pub fn flags(&self, mode: Mode, cost: f64, restricted: bool) -> Result<TurnRecord, EncodingError> {
        let mut record = self.create_record();
        self.set(&mut record, mode, cost, restricted)?;
        Ok(record)
    }

    /// Writes `mode`'s turn data into an existing record.
    ///
    /// An infinite cost marks the turn as restricted.
    /// Finite costs are silently capped to `[0, max_cost]`.
    ///
    /// # Errors
    ///
    /// Fails if `mode` has no turn properties.
    pub fn set(
        &self,
        record: &mut TurnRecord,
        mode: Mode,
        cost: f64,
        restricted: bool,
    ) -> Result<(), EncodingError> {
        let properties = self.properties(mode)?;
        let restricted = restricted || (cost.is_infinite() && cost.is_sign_positive());
        properties
            .restricted
            .set(Direction::Forward, record, restricted);
        let cost = if restricted || cost.is_nan() {
            0.0
        } else {
            cost.clamp(0.0, f64::from(properties.max_cost))
        };
        properties.cost.set_clamped(Direction::Forward, record, cost);
        Ok(())
    }

    /// # Errors
    ///
    /// Fails if `mode` has no turn properties.
    pub fn is_restricted(&self, record: &TurnRecord, mode: Mode) -> Result<bool, EncodingError> {
        Ok(self
            .properties(mode)?
            .restricted
            .get(Direction::Forward, record))
    }

    /// The turn cost for `mode`; infinite if the turn is restricted.
    ///
    /// # Errors
    ///
    /// Fails if `mode` has no turn properties.
    pub fn cost(&self, record: &TurnRecord, mode: Mode) -> Result<f64, EncodingError> {
        let properties = self.properties(mode)?;
        if properties.restricted.get(Direction::Forward, record) {
            Ok(f64::INFINITY)
        } else {
            Ok(properties.cost.get(Direction::Forward, record))
        }
    }
}

/// Turn records keyed by turn, as handed to graph storage.
#[derive(Debug, Default)]
pub struct TurnCostTable {
    records: HashMap<TurnKey, TurnRecord>,
}

impl TurnCostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `mode`'s data for a turn, keeping data other modes already stored for it.
    ///
    /// # Errors
    ///
    /// Fails if `mode` has no turn properties.
    pub fn add(
        &mut self,
        codec: &TurnCostCodec,
        key: TurnKey,
        mode: Mode,
        cost: f64,
        restricted: bool,
    ) -> Result<(), EncodingError> {
        match self.records.entry(key) {
            Entry::Occupied(mut entry) => codec.set(entry.get_mut(), mode, cost, restricted),
            Entry::Vacant(entry) => {
                entry.insert(codec.flags(mode, cost, restricted)?);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &TurnKey) -> Option<&TurnRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TurnKey, &TurnRecord)> {
        self.records.iter()
    }
}
