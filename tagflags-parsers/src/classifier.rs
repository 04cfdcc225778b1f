use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, Oneway};
use crate::config::ModeSettings;
use crate::osm::{ReaderNode, ReaderWay};
use crate::speed::set_speed;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tagflags_conditional::{ConditionalTagInspector, HolidayCalendar, NoHolidays};
use tagflags_encoding::values::RouteNetwork;
use tagflags_encoding::{
    BooleanProperty, DecimalProperty, Direction, EdgeRecord, Mode, PriorityCode, PropertySpec,
    RegistryBuilder,
};

/// Route network memberships of a way, resolved by the relation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RouteNetworks {
    pub bike: RouteNetwork,
    pub mtb: RouteNetwork,
    pub foot: RouteNetwork,
}

/// Shared inputs for building classifiers.
#[derive(Clone)]
pub struct ClassifierContext {
    /// "Now" for the static conditional verdict.
    pub reference_time: NaiveDateTime,
    pub calendar: Arc<dyn HolidayCalendar>,
}

impl ClassifierContext {
    pub fn new(reference_time: NaiveDateTime) -> Self {
        Self {
            reference_time,
            calendar: Arc::new(NoHolidays),
        }
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn inspector(&self, rules: &AccessRules) -> ConditionalTagInspector {
        rules
            .inspector(self.reference_time)
            .with_calendar(Arc::clone(&self.calendar))
    }
}

impl std::fmt::Debug for ClassifierContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierContext")
            .field("reference_time", &self.reference_time)
            .finish_non_exhaustive()
    }
}

/// The rule chain of one transportation mode.
///
/// Implementations only ever write their own namespace of the record.
pub trait ModeClassifier: Send + Sync {
    fn mode(&self) -> Mode;

    /// The static access verdict of a way.
    fn access(&self, way: &ReaderWay) -> AccessVerdict;

    /// Writes access, speeds and priority of `way` for this mode.
    ///
    /// Returns the access verdict so the caller can keep conditional restrictions.
    ///
    /// # Errors
    ///
    /// Fails on malformed numeric tags; the record may then be partially written and
    /// should be reset for this mode's namespace.
    fn handle_way_tags(
        &self,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        networks: &RouteNetworks,
    ) -> Result<AccessVerdict, TagParseError>;

    /// Whether a node blocks this mode.
    fn is_barrier(&self, node: &ReaderNode) -> bool;

    /// The reader of this mode's conditional tags.
    fn inspector(&self) -> &ConditionalTagInspector;
}

/// The access, speed and priority fields of one mode.
#[derive(Debug, Clone)]
pub struct ModeProperties {
    pub access: BooleanProperty,
    pub speed: DecimalProperty,
    pub priority: Option<DecimalProperty>,
    /// The highest speed the mode stores; below the field's capacity.
    pub max_speed: f64,
}

impl ModeProperties {
    /// Declares `<mode>.access` and `<mode>.average_speed` (both direction-aware),
    /// and optionally `<mode>.priority`.
    ///
    /// # Errors
    ///
    /// Fails on duplicate declarations or illegal widths.
    pub fn declare(
        builder: &mut RegistryBuilder,
        settings: &ModeSettings,
        with_priority: bool,
    ) -> Result<Self, TagParseError> {
        let mode = settings.mode;
        let access = builder.declare_boolean(mode.key("access"), true)?;
        let speed = builder.declare_decimal(PropertySpec::decimal(
            mode.key("average_speed"),
            settings.speed_bits,
            settings.speed_factor,
            true,
        ))?;
        let priority = if with_priority {
            Some(builder.declare_decimal(PropertySpec::decimal(
                mode.key("priority"),
                settings.priority_bits,
                PriorityCode::STORAGE_FACTOR,
                false,
            ))?)
        } else {
            None
        };
        let max_speed = settings.max_speed.min(speed.max_storable());
        Ok(Self {
            access,
            speed,
            priority,
            max_speed,
        })
    }

    /// The smallest non-zero speed the field can hold.
    pub fn min_speed(&self) -> f64 {
        self.speed.factor()
    }

    /// Opens the permitted directions with their speeds; closes the others.
    pub fn apply(&self, record: &mut EdgeRecord, oneway: Oneway, speeds: [f64; 2]) {
        for (direction, speed) in Direction::BOTH.into_iter().zip(speeds) {
            if oneway.allows(direction) {
                set_speed(
                    &self.speed,
                    &self.access,
                    direction,
                    record,
                    speed.min(self.max_speed),
                );
            } else {
                self.access.set(direction, record, false);
                self.speed.set_clamped(direction, record, 0.0);
            }
        }
    }

    pub fn set_priority(&self, record: &mut EdgeRecord, factor: f64) {
        if let Some(priority) = &self.priority {
            priority.set_clamped(Direction::Forward, record, factor);
        }
    }

    pub fn speed(&self, direction: Direction, record: &EdgeRecord) -> f64 {
        self.speed.get(direction, record)
    }

    pub fn priority(&self, record: &EdgeRecord) -> Option<f64> {
        self.priority
            .as_ref()
            .map(|p| p.get(Direction::Forward, record))
    }

    pub fn has_access(&self, direction: Direction, record: &EdgeRecord) -> bool {
        self.access.get(direction, record)
    }
}

/// Looks `key` up in a rule table.
pub(crate) fn lookup<T: Copy>(table: &[(&str, T)], key: &str) -> Option<T> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}
