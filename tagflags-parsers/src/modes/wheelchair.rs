use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, Oneway};
use crate::classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks};
use crate::config::ModeSettings;
use crate::modes::foot::{
    INTENDED_VALUES, MEAN_SPEED, RESTRICTED_VALUES, SIDEWALK_VALUES, SLOW_SPEED, foot_oneway,
    has_sidewalk, pedestrian_priority,
};
use crate::osm::{ReaderNode, ReaderWay, Tagged};
use crate::speed::FerrySpeed;
use tagflags_conditional::ConditionalTagInspector;
use tagflags_encoding::{Direction, EdgeRecord, Mode, PriorityCode, RegistryBuilder};

const RESTRICTIONS: &[&str] = &["wheelchair", "foot", "access"];
const ABSOLUTE_BARRIERS: &[&str] = &[
    "fence",
    "wall",
    "handrail",
    "turnstile",
    "stile",
    "kissing_gate",
];
const POTENTIAL_BARRIERS: &[&str] = &[
    "gate",
    "lift_gate",
    "swing_gate",
    "chain",
    "kerb",
    "cattle_grid",
    "motorcycle_barrier",
];

const SAFE_HIGHWAYS: &[&str] = &[
    "footway",
    "pedestrian",
    "living_street",
    "residential",
    "service",
    "platform",
];
const AVOID_HIGHWAYS: &[&str] = &[
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "steps",
    "track",
];
const OTHER_HIGHWAYS: &[&str] = &["cycleway", "unclassified", "road"];

const EXCLUDED_SURFACES: &[&str] = &["cobblestone", "gravel", "sand"];
const EXCLUDED_SMOOTHNESS: &[&str] = &["bad", "very_bad", "horrible", "very_horrible", "impassable"];

/// Tagged inclines beyond this (in percent, either way) are impassable.
const MAX_INCLINE_PERCENT: f64 = 6.0;
/// Measured slopes beyond this slow down the uphill direction.
const SMALL_INCLINE_PERCENT: f64 = 3.0;
const MAX_KERB_HEIGHT_CM: f64 = 3.0;
/// Slopes of shorter ways are not meaningful.
const MIN_SLOPE_LENGTH: f64 = 1.0;

/// The tagged incline in percent. `up`, `down` and friends carry no number.
///
/// # Errors
///
/// Fails on values that are neither a direction word nor a number.
fn incline_percent(way: &ReaderWay) -> Result<Option<f64>, TagParseError> {
    let Some(value) = way.tag("incline") else {
        return Ok(None);
    };
    let value = value.trim();
    if matches!(value, "up" | "down" | "yes" | "no") {
        return Ok(None);
    }
    let invalid = || TagParseError::InvalidNumber {
        key: "incline".to_owned(),
        value: value.to_owned(),
    };
    if let Some(degrees) = value.strip_suffix('°') {
        let degrees: f64 = degrees.trim().parse().map_err(|_| invalid())?;
        return Ok(Some(degrees.to_radians().tan() * 100.0));
    }
    value
        .strip_suffix('%')
        .unwrap_or(value)
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| invalid())
}

/// The kerb height in centimetres, if tagged with a unit.
fn kerb_height_cm(way: &ReaderWay) -> Option<f64> {
    let value = way.tag("kerb")?.trim();
    if let Some(mm) = value.strip_suffix("mm") {
        mm.trim().parse::<f64>().ok().map(|mm| mm / 10.0)
    } else {
        value.strip_suffix("cm")?.trim().parse().ok()
    }
}

/// Whether `key` (e.g. `surface`) is excluded, allowing a suitable sidewalk to override it.
fn excluded_unless_sidewalk(way: &ReaderWay, key: &str, excluded: &[&str]) -> bool {
    if !way.has_tag_in(key, excluded) {
        return false;
    }
    match way.tag("sidewalk") {
        Some(side) if SIDEWALK_VALUES.contains(&side) => {
            way.has_tag_in(&format!("sidewalk:{side}:{key}"), excluded)
        }
        _ => true,
    }
}

/// The slope of a way in percent, from its elevation profile.
fn slope_percent(way: &ReaderWay) -> Option<f64> {
    if way.elevations.len() < 2 || way.elevations.len() != way.coordinates.len() {
        return None;
    }
    let length = way.length().filter(|l| *l >= MIN_SLOPE_LENGTH)?;
    let first = way.elevations.first()?;
    let last = way.elevations.last()?;
    Some((last - first) / length * 100.0)
}

/// Wheelchair users.
#[derive(Debug)]
pub struct WheelchairClassifier {
    rules: AccessRules,
    properties: ModeProperties,
    inspector: ConditionalTagInspector,
    ferry: FerrySpeed,
}

impl WheelchairClassifier {
    /// Declares the wheelchair properties.
    ///
    /// # Errors
    ///
    /// Fails if the properties cannot be declared.
    pub fn new(
        builder: &mut RegistryBuilder,
        settings: &ModeSettings,
        context: &ClassifierContext,
    ) -> Result<Self, TagParseError> {
        let rules = AccessRules::new(
            RESTRICTIONS,
            RESTRICTED_VALUES,
            INTENDED_VALUES,
            settings.block_private,
            settings.block_fords,
        )
        .with_barriers(ABSOLUTE_BARRIERS, POTENTIAL_BARRIERS);
        Ok(Self {
            inspector: context.inspector(&rules),
            properties: ModeProperties::declare(builder, settings, true)?,
            rules,
            ferry: FerrySpeed::default(),
        })
    }

    pub fn properties(&self) -> &ModeProperties {
        &self.properties
    }

    /// Pedestrian access on the wheelchair's own highway sets.
    fn pedestrian_access(&self, way: &ReaderWay, highway: &str) -> AccessVerdict {
        let conditional = self.inspector.has_conditional(&way.tags);
        if way.has_tag_in("foot", INTENDED_VALUES) {
            return AccessVerdict::WAY.with_conditional(conditional);
        }
        if self.rules.is_restricted(way)
            && !(conditional && self.inspector.restricted_way_conditionally_permitted(&way.tags))
        {
            return AccessVerdict::SKIP.with_conditional(conditional);
        }
        if has_sidewalk(way) {
            return AccessVerdict::WAY.with_conditional(conditional);
        }
        let allowed = SAFE_HIGHWAYS.contains(&highway)
            || AVOID_HIGHWAYS.contains(&highway)
            || OTHER_HIGHWAYS.contains(&highway);
        if !allowed || way.has_tag("motorroad", "yes") {
            return AccessVerdict::SKIP;
        }
        self.rules.way_access(way, &self.inspector)
    }

    /// Slows the uphill direction of moderate slopes and closes steep ways.
    fn apply_slope(&self, record: &mut EdgeRecord, way: &ReaderWay) {
        let Some(slope) = slope_percent(way) else {
            return;
        };
        if slope.abs() > MAX_INCLINE_PERCENT {
            for direction in Direction::BOTH {
                self.properties.access.set(direction, record, false);
            }
            return;
        }
        if slope.abs() <= SMALL_INCLINE_PERCENT {
            return;
        }
        let uphill = if slope > 0.0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        for (direction, speed) in [(uphill, SLOW_SPEED), (uphill.reversed(), MEAN_SPEED)] {
            if self.properties.has_access(direction, record) {
                self.properties
                    .speed
                    .set_clamped(direction, record, speed);
            }
        }
    }
}

impl ModeClassifier for WheelchairClassifier {
    fn mode(&self) -> Mode {
        Mode::Wheelchair
    }

    fn access(&self, way: &ReaderWay) -> AccessVerdict {
        let Some(highway) = way.tag("highway") else {
            if let Some(ferry) = self.rules.ferry(way) {
                return ferry;
            }
            if way.has_tag("railway", "platform") || way.has_tag("man_made", "pier") {
                return self.rules.way_access(way, &self.inspector);
            }
            return AccessVerdict::SKIP;
        };
        if way.has_tag_in("wheelchair", INTENDED_VALUES) {
            return AccessVerdict::WAY.with_conditional(self.inspector.has_conditional(&way.tags));
        }
        if way.tag("sac_scale").is_some()
            || (AVOID_HIGHWAYS.contains(&highway) && !has_sidewalk(way))
            || excluded_unless_sidewalk(way, "surface", EXCLUDED_SURFACES)
            || excluded_unless_sidewalk(way, "smoothness", EXCLUDED_SMOOTHNESS)
        {
            return AccessVerdict::SKIP;
        }
        // malformed inclines are reported by `handle_way_tags`
        if incline_percent(way)
            .ok()
            .flatten()
            .is_some_and(|incline| incline.abs() > MAX_INCLINE_PERCENT)
        {
            return AccessVerdict::SKIP;
        }
        if way.has_tag("kerb", "raised")
            || kerb_height_cm(way).is_some_and(|height| height > MAX_KERB_HEIGHT_CM)
        {
            return AccessVerdict::SKIP;
        }
        self.pedestrian_access(way, highway)
    }

    fn handle_way_tags(
        &self,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        _networks: &RouteNetworks,
    ) -> Result<AccessVerdict, TagParseError> {
        incline_percent(way)?;
        let verdict = self.access(way);
        if verdict.can_skip() {
            return Ok(verdict);
        }
        if verdict.is_ferry() {
            let speed = self.ferry.speed(
                way,
                self.properties.min_speed(),
                self.properties.max_speed,
            );
            self.properties.apply(record, Oneway::Both, [speed, speed]);
            self.properties
                .set_priority(record, PriorityCode::SlightAvoid.factor());
            return Ok(verdict);
        }
        self.properties
            .apply(record, foot_oneway(way), [MEAN_SPEED, MEAN_SPEED]);
        self.apply_slope(record, way);

        let mut priority = pedestrian_priority(way, SAFE_HIGHWAYS, AVOID_HIGHWAYS);
        if way.has_tag("wheelchair", "designated") {
            priority.put(102, PriorityCode::VeryNice);
        } else if way.has_tag("wheelchair", "limited") {
            priority.put(102, PriorityCode::ReachDestination);
        }
        self.properties.set_priority(record, priority.factor());
        Ok(verdict)
    }

    fn is_barrier(&self, node: &ReaderNode) -> bool {
        node.has_tag("kerb", "raised") || self.rules.is_barrier(node)
    }

    fn inspector(&self) -> &ConditionalTagInspector {
        &self.inspector
    }
}
