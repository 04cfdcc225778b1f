use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, Oneway, vehicle_oneway};
use crate::classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks, lookup};
use crate::config::ModeSettings;
use crate::osm::{ReaderNode, ReaderWay, Tagged};
use crate::priority::WeightedPriority;
use crate::speed::{FerrySpeed, max_speed};
use tagflags_conditional::ConditionalTagInspector;
use tagflags_encoding::{Direction, EdgeRecord, Mode, PriorityCode, RegistryBuilder};

pub(crate) const RESTRICTIONS: &[&str] = &["motorcar", "motor_vehicle", "vehicle", "access"];
pub(crate) const RESTRICTED_VALUES: &[&str] = &[
    "agricultural",
    "forestry",
    "no",
    "restricted",
    "delivery",
    "military",
    "emergency",
    "private",
];
pub(crate) const INTENDED_VALUES: &[&str] = &["yes", "designated", "permissive"];
pub(crate) const ABSOLUTE_BARRIERS: &[&str] = &[
    "kissing_gate",
    "fence",
    "bollard",
    "stile",
    "turnstile",
    "cycle_barrier",
    "motorcycle_barrier",
    "block",
    "bus_trap",
    "sump_buster",
    "jersey_barrier",
];
pub(crate) const POTENTIAL_BARRIERS: &[&str] =
    &["gate", "lift_gate", "swing_gate", "chain", "entrance", "toll_booth"];

/// Surfaces that cap motorized speeds at [`BAD_SURFACE_SPEED`].
pub(crate) const BAD_SURFACES: &[&str] = &[
    "cobblestone",
    "grass_paver",
    "gravel",
    "sand",
    "paving_stones",
    "dirt",
    "ground",
    "grass",
    "unpaved",
    "compacted",
];
pub(crate) const BAD_SURFACE_SPEED: f64 = 30.0;

/// Signed limits are not driven at exactly the limit.
pub(crate) const MAX_SPEED_FACTOR: f64 = 0.9;

const HIGHWAY_SPEEDS: &[(&str, f64)] = &[
    ("motorway", 100.0),
    ("motorway_link", 70.0),
    ("trunk", 70.0),
    ("trunk_link", 65.0),
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

const TRACKTYPE_SPEEDS: &[(&str, f64)] = &[("grade1", 20.0), ("grade2", 15.0), ("grade3", 10.0)];

/// Ways that are never driveable, whatever their class.
pub(crate) fn is_impassable(way: &ReaderWay) -> bool {
    way.has_tag("impassable", "yes")
        || way.has_tag("status", "impassable")
        || way.has_tag("service", "emergency_access")
}

/// The base speed from the speed and tracktype tables, then signed limits and bad surfaces.
pub(crate) fn motorized_speed(
    way: &ReaderWay,
    direction: Direction,
    highway_speeds: &[(&str, f64)],
    tracktype_speeds: &[(&str, f64)],
) -> f64 {
    let highway = way.tag("highway").unwrap_or_default();
    let mut speed = lookup(highway_speeds, highway).unwrap_or_default();
    if highway == "track" {
        if let Some(tracktype) = way.tag("tracktype").and_then(|t| lookup(tracktype_speeds, t)) {
            speed = tracktype;
        }
    }
    if let Some(limit) = max_speed(way, direction) {
        speed = limit * MAX_SPEED_FACTOR;
    }
    if speed > BAD_SURFACE_SPEED && way.has_tag_in("surface", BAD_SURFACES) {
        speed = BAD_SURFACE_SPEED;
    }
    speed
}

/// Cars, including motor vehicles in general.
#[derive(Debug)]
pub struct CarClassifier {
    rules: AccessRules,
    properties: ModeProperties,
    inspector: ConditionalTagInspector,
    ferry: FerrySpeed,
}

impl CarClassifier {
    /// Declares the car properties.
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

    fn priority(&self, way: &ReaderWay) -> WeightedPriority {
        let mut priority = WeightedPriority::new();
        if self.rules.first_values(way).contains(&"destination") {
            priority.put(100, PriorityCode::ReachDestination);
        }
        priority
    }
}

impl ModeClassifier for CarClassifier {
    fn mode(&self) -> Mode {
        Mode::Car
    }

    fn access(&self, way: &ReaderWay) -> AccessVerdict {
        let Some(highway) = way.tag("highway") else {
            return self.rules.ferry(way).unwrap_or(AccessVerdict::SKIP);
        };
        if highway == "track"
            && way
                .tag("tracktype")
                .is_some_and(|t| lookup(TRACKTYPE_SPEEDS, t).is_none())
        {
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
        let oneway = vehicle_oneway(way, &self.rules, &["vehicle", "motor_vehicle"]);
        if verdict.is_ferry() {
            let speed = self.ferry.speed(
                way,
                self.properties.min_speed(),
                self.properties.max_speed,
            );
            self.properties
                .apply(record, Oneway::Both, [speed, speed]);
        } else {
            let speeds = Direction::BOTH
                .map(|d| motorized_speed(way, d, HIGHWAY_SPEEDS, TRACKTYPE_SPEEDS));
            self.properties.apply(record, oneway, speeds);
        }
        self.properties
            .set_priority(record, self.priority(way).factor());
        Ok(verdict)
    }

    fn is_barrier(&self, node: &ReaderNode) -> bool {
        self.rules.is_barrier(node)
    }

    fn inspector(&self) -> &ConditionalTagInspector {
        &self.inspector
    }
}

#[cfg(test)]
mod tests {
    use super::CarClassifier;
    use crate::access::AccessVerdict;
    use crate::classifier::{ModeClassifier, RouteNetworks};
    use crate::config::{ModeConfig, ModeSettings};
    use crate::modes::test_context;
    use crate::osm::{ReaderNode, ReaderWay};
    use tagflags_encoding::{Direction, PropertyRegistry, RegistryBuilder};

    fn car(config: &str) -> (PropertyRegistry, CarClassifier) {
        let config: ModeConfig = config.parse().expect("valid config");
        let settings = ModeSettings::resolve(&config).expect("valid settings");
        let mut builder = RegistryBuilder::new();
        let car = CarClassifier::new(&mut builder, &settings, &test_context()).expect("declares");
        (builder.seal(), car)
    }

    fn speeds(car: &CarClassifier, registry: &PropertyRegistry, way: &ReaderWay) -> [f64; 2] {
        let mut record = registry.create_record();
        car.handle_way_tags(&mut record, way, &RouteNetworks::default())
            .expect("classifies");
        Direction::BOTH.map(|d| car.properties().speed(d, &record))
    }

    #[test]
    fn access() {
        let (_, car) = car("car");
        let way = ReaderWay::new(1).with_tag("highway", "service");
        assert_eq!(car.access(&way), AccessVerdict::WAY);
        assert_eq!(
            car.access(&way.clone().with_tag("service", "emergency_access")),
            AccessVerdict::SKIP
        );
        assert_eq!(car.access(&ReaderWay::new(2).with_tag("highway", "footway")), AccessVerdict::SKIP);
        let track = ReaderWay::new(3).with_tag("highway", "track");
        assert_eq!(car.access(&track), AccessVerdict::WAY);
        assert_eq!(
            car.access(&track.clone().with_tag("tracktype", "grade2")),
            AccessVerdict::WAY
        );
        assert_eq!(
            car.access(&track.with_tag("tracktype", "grade5")),
            AccessVerdict::SKIP
        );
        assert_eq!(
            car.access(
                &ReaderWay::new(4)
                    .with_tag("highway", "primary")
                    .with_tag("motor_vehicle", "agricultural;forestry")
            ),
            AccessVerdict::SKIP
        );
        assert_eq!(
            car.access(
                &ReaderWay::new(5)
                    .with_tag("highway", "primary")
                    .with_tag("access", "no")
                    .with_tag("motorcar", "yes")
            ),
            AccessVerdict::WAY
        );
        assert_eq!(
            car.access(&ReaderWay::new(6).with_tag("route", "ferry")),
            AccessVerdict::FERRY
        );
    }

    #[test]
    fn private_roads_depend_on_configuration() {
        let way = ReaderWay::new(1)
            .with_tag("highway", "residential")
            .with_tag("access", "private");
        assert_eq!(car("car").1.access(&way), AccessVerdict::SKIP);
        assert_eq!(car("car|block_private=false").1.access(&way), AccessVerdict::WAY);
    }

    #[test]
    fn speeds_from_tables_and_limits() {
        let (registry, car) = car("car");
        let way = ReaderWay::new(1).with_tag("highway", "primary");
        assert_eq!(speeds(&car, &registry, &way), [65.0, 65.0]);

        // 50 * 0.9 rounds to the nearest 5 km/h step
        let limited = way.clone().with_tag("maxspeed", "50");
        assert_eq!(speeds(&car, &registry, &limited), [45.0, 45.0]);

        let bumpy = way.with_tag("surface", "cobblestone");
        assert_eq!(speeds(&car, &registry, &bumpy), [30.0, 30.0]);

        let track = ReaderWay::new(2)
            .with_tag("highway", "track")
            .with_tag("tracktype", "grade1");
        assert_eq!(speeds(&car, &registry, &track), [20.0, 20.0]);

        let oneway = ReaderWay::new(3)
            .with_tag("highway", "secondary")
            .with_tag("oneway", "-1");
        assert_eq!(speeds(&car, &registry, &oneway), [0.0, 60.0]);
    }

    #[test]
    fn miles_per_hour_are_quantized_to_the_speed_field() {
        let (registry, car) = car("car|speed_bits=10|speed_factor=0.5");
        let way = ReaderWay::new(1)
            .with_tag("highway", "motorway_link")
            .with_tag("maxspeed", "60 mph");
        let [forward, _] = speeds(&car, &registry, &way);
        assert!((forward - 86.9).abs() <= 0.1 + 1e-9, "{forward}");

        let way = way.with_tag("maxspeed", "70 mph");
        let [forward, backward] = speeds(&car, &registry, &way);
        assert!((forward - 101.5).abs() < 1e-9, "{forward}");
        assert!((backward - 101.5).abs() < 1e-9, "{backward}");

        // the car max speed caps absurd limits
        let way = way.with_tag("maxspeed", "300");
        assert_eq!(speeds(&car, &registry, &way), [140.0, 140.0]);
    }

    #[test]
    fn destination_only_roads() {
        let (registry, car) = car("car");
        let way = ReaderWay::new(1)
            .with_tag("highway", "residential")
            .with_tag("motor_vehicle", "destination");
        let mut record = registry.create_record();
        car.handle_way_tags(&mut record, &way, &RouteNetworks::default())
            .expect("classifies");
        let priority = car.properties().priority(&record).expect("has priority");
        assert!((priority - 0.1).abs() < 1e-9);
    }

    #[test]
    fn barriers() {
        let (_, car) = car("car");
        assert!(car.is_barrier(&ReaderNode::new(1).with_tag("barrier", "bollard")));
        assert!(!car.is_barrier(&ReaderNode::new(1).with_tag("barrier", "gate")));
        assert!(car.is_barrier(
            &ReaderNode::new(1)
                .with_tag("barrier", "gate")
                .with_tag("access", "no")
        ));
        // fords only block when configured to
        assert!(!car.is_barrier(&ReaderNode::new(1).with_tag("ford", "yes")));
        let (_, strict) = self::car("car|block_fords=true");
        assert!(strict.is_barrier(&ReaderNode::new(1).with_tag("ford", "yes")));
    }
}
