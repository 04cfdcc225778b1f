use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, Oneway, vehicle_oneway};
use crate::classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks, lookup};
use crate::config::ModeSettings;
use crate::generic::beeline_ratio;
use crate::modes::car::{
    BAD_SURFACE_SPEED, BAD_SURFACES, INTENDED_VALUES, MAX_SPEED_FACTOR, POTENTIAL_BARRIERS,
    RESTRICTED_VALUES, is_impassable, motorized_speed,
};
use crate::osm::{ReaderNode, ReaderWay, Tagged};
use crate::priority::WeightedPriority;
use crate::speed::{FerrySpeed, parse_speed};
use tagflags_conditional::ConditionalTagInspector;
use tagflags_encoding::{
    DecimalProperty, Direction, EdgeRecord, Mode, PriorityCode, PropertySpec, RegistryBuilder,
};

const RESTRICTIONS: &[&str] = &["motorcycle", "motor_vehicle", "vehicle", "access"];
const ABSOLUTE_BARRIERS: &[&str] = &[
    "kissing_gate",
    "fence",
    "bollard",
    "stile",
    "turnstile",
    "cycle_barrier",
    "motorcycle_barrier",
    "block",
    "jersey_barrier",
];

const HIGHWAY_SPEEDS: &[(&str, f64)] = &[
    ("motorway", 100.0),
    ("motorway_link", 70.0),
    ("motorroad", 90.0),
    ("trunk", 80.0),
    ("trunk_link", 75.0),
    ("primary", 65.0),
    ("primary_link", 60.0),
    ("secondary", 60.0),
    ("secondary_link", 50.0),
    ("tertiary", 50.0),
    ("tertiary_link", 40.0),
    ("unclassified", 30.0),
    ("residential", 30.0),
    ("living_street", 5.0),
    ("service", 20.0),
    ("road", 20.0),
    ("track", 15.0),
];

const TRACKTYPE_SPEEDS: &[(&str, f64)] = &[
    ("grade1", 20.0),
    ("grade2", 15.0),
    ("grade3", 10.0),
    ("grade4", 5.0),
    ("grade5", 5.0),
];

const AVOID_HIGHWAYS: &[&str] = &["motorway", "trunk", "motorroad", "residential"];
const PREFER_HIGHWAYS: &[&str] = &["primary", "secondary", "tertiary"];

/// Curvature is only interesting where one can ride fast.
const MIN_CURVY_SPEED: f64 = 51.0;
const CURVATURE_BITS: u32 = 4;
const CURVATURE_FACTOR: f64 = 0.1;

/// The squared beeline/length ratio of a way; 1 for straight, slow or implausible ways.
pub fn motorcycle_curvature(way: &ReaderWay, speed: f64) -> f64 {
    if speed < MIN_CURVY_SPEED {
        return 1.0;
    }
    match beeline_ratio(way) {
        Some(ratio) => {
            let curvature = ratio * ratio;
            if (0.01..=1.0).contains(&curvature) {
                curvature
            } else {
                1.0
            }
        }
        None => 1.0,
    }
}

/// Motorcycles, which prefer curvy secondary roads.
#[derive(Debug)]
pub struct MotorcycleClassifier {
    rules: AccessRules,
    properties: ModeProperties,
    curvature: DecimalProperty,
    inspector: ConditionalTagInspector,
    ferry: FerrySpeed,
}

impl MotorcycleClassifier {
    /// Declares the motorcycle properties, including `motorcycle.curvature`.
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
        let properties = ModeProperties::declare(builder, settings, true)?;
        let curvature = builder.declare_decimal(PropertySpec::decimal(
            settings.mode.key("curvature"),
            CURVATURE_BITS,
            CURVATURE_FACTOR,
            false,
        ))?;
        Ok(Self {
            inspector: context.inspector(&rules),
            rules,
            properties,
            curvature,
            ferry: FerrySpeed::default(),
        })
    }

    pub fn properties(&self) -> &ModeProperties {
        &self.properties
    }

    pub fn curvature(&self, record: &EdgeRecord) -> f64 {
        self.curvature.get(Direction::Forward, record)
    }

    fn speed(way: &ReaderWay, direction: Direction) -> f64 {
        let mut speed = motorized_speed(way, direction, HIGHWAY_SPEEDS, TRACKTYPE_SPEEDS);
        if let Some(limit) = way.tag("maxspeed:motorcycle").and_then(parse_speed) {
            if limit < speed {
                speed = limit * MAX_SPEED_FACTOR;
            }
        }
        if speed > BAD_SURFACE_SPEED && way.has_tag_in("surface", BAD_SURFACES) {
            speed = BAD_SURFACE_SPEED;
        }
        speed
    }

    fn priority(way: &ReaderWay) -> WeightedPriority {
        let mut priority = WeightedPriority::new();
        let highway = way.tag("highway").unwrap_or_default();
        if AVOID_HIGHWAYS.contains(&highway) || way.has_tag("motorroad", "yes") {
            priority.put(100, PriorityCode::Bad);
        } else if PREFER_HIGHWAYS.contains(&highway) {
            priority.put(100, PriorityCode::Best);
        }
        priority
    }
}

impl ModeClassifier for MotorcycleClassifier {
    fn mode(&self) -> Mode {
        Mode::Motorcycle
    }

    fn access(&self, way: &ReaderWay) -> AccessVerdict {
        let Some(highway) = way.tag("highway") else {
            return self.rules.ferry(way).unwrap_or(AccessVerdict::SKIP);
        };
        if highway == "track" && way.tag("tracktype").is_some_and(|t| t != "grade1") {
            return AccessVerdict::SKIP;
        }
        if lookup(HIGHWAY_SPEEDS, highway).is_none() || is_impassable(way) {
            return AccessVerdict::SKIP;
        }
        self.rules.way_access(way, &self.inspector)
    }

    fn handle_way_tags(
        &self,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        _networks: &RouteNetworks,
    ) -> Result<AccessVerdict, TagParseError> {
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
        } else {
            let oneway = vehicle_oneway(way, &self.rules, &["vehicle", "motor_vehicle"]);
            let speeds = Direction::BOTH.map(|d| Self::speed(way, d));
            self.properties.apply(record, oneway, speeds);
        }
        self.properties
            .set_priority(record, Self::priority(way).factor());

        let speed = Direction::BOTH
            .into_iter()
            .map(|d| self.properties.speed(d, record))
            .fold(0.0, f64::max);
        self.curvature
            .set_clamped(Direction::Forward, record, motorcycle_curvature(way, speed));
        Ok(verdict)
    }

    fn is_barrier(&self, node: &ReaderNode) -> bool {
        self.rules.is_barrier(node)
    }

    fn inspector(&self) -> &ConditionalTagInspector {
        &self.inspector
    }
}
