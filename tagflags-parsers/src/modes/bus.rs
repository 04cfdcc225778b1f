use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, Oneway, vehicle_oneway};
use crate::classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks, lookup};
use crate::config::ModeSettings;
use crate::modes::car::{
    ABSOLUTE_BARRIERS, INTENDED_VALUES, POTENTIAL_BARRIERS, RESTRICTED_VALUES, is_impassable,
    motorized_speed,
};
use crate::osm::{ReaderNode, ReaderWay, Tagged};
use crate::priority::WeightedPriority;
use crate::speed::FerrySpeed;
use tagflags_conditional::ConditionalTagInspector;
use tagflags_encoding::{Direction, EdgeRecord, Mode, PriorityCode, RegistryBuilder};

const RESTRICTIONS: &[&str] = &["bus", "psv", "motor_vehicle", "vehicle", "access"];

const HIGHWAY_SPEEDS: &[(&str, f64)] = &[
    ("motorway", 90.0),
    ("motorway_link", 60.0),
    ("trunk", 70.0),
    ("trunk_link", 60.0),
    ("primary", 60.0),
    ("primary_link", 50.0),
    ("secondary", 55.0),
    ("secondary_link", 45.0),
    ("tertiary", 45.0),
    ("tertiary_link", 35.0),
    ("unclassified", 30.0),
    ("residential", 30.0),
    ("living_street", 5.0),
    ("service", 20.0),
    ("road", 20.0),
    ("busway", 50.0),
];

const LANE_KEYS: &[&str] = &["lanes:bus", "lanes:psv"];

/// Whether a way carries a dedicated bus lane in any direction.
fn has_bus_lane(way: &ReaderWay) -> bool {
    LANE_KEYS
        .iter()
        .any(|key| way.tag(key).is_some_and(|n| n.trim() != "0"))
        || way
            .tags
            .iter()
            .any(|(k, v)| (k == "busway" || k.starts_with("busway:")) && v != "no")
}

/// Buses and other public service vehicles.
#[derive(Debug)]
pub struct BusClassifier {
    rules: AccessRules,
    properties: ModeProperties,
    inspector: ConditionalTagInspector,
    ferry: FerrySpeed,
}

impl BusClassifier {
    /// Declares the bus properties.
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
        if has_bus_lane(way) || way.has_tag("highway", "busway") {
            priority.put(100, PriorityCode::Prefer);
        }
        if self.rules.first_values(way).contains(&"destination") {
            priority.put(110, PriorityCode::ReachDestination);
        }
        priority
    }
}

impl ModeClassifier for BusClassifier {
    fn mode(&self) -> Mode {
        Mode::Bus
    }

    fn access(&self, way: &ReaderWay) -> AccessVerdict {
        let Some(highway) = way.tag("highway") else {
            return self.rules.ferry(way).unwrap_or(AccessVerdict::SKIP);
        };
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
            let oneway = vehicle_oneway(way, &self.rules, &["psv", "vehicle", "motor_vehicle"]);
            let speeds = Direction::BOTH.map(|d| motorized_speed(way, d, HIGHWAY_SPEEDS, &[]));
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
    use super::BusClassifier;
    use crate::access::AccessVerdict;
    use crate::classifier::{ModeClassifier, RouteNetworks};
    use crate::config::{ModeConfig, ModeSettings};
    use crate::modes::test_context;
    use crate::osm::ReaderWay;
    use tagflags_encoding::{Direction, Mode, PriorityCode, PropertyRegistry, RegistryBuilder};

    fn bus() -> (PropertyRegistry, BusClassifier) {
        let settings = ModeSettings::resolve(&ModeConfig::new(Mode::Bus)).expect("valid settings");
        let mut builder = RegistryBuilder::new();
        let bus = BusClassifier::new(&mut builder, &settings, &test_context()).expect("declares");
        (builder.seal(), bus)
    }

    fn classify(
        bus: &BusClassifier,
        registry: &PropertyRegistry,
        way: &ReaderWay,
    ) -> (PriorityCode, [f64; 2]) {
        let mut record = registry.create_record();
        bus.handle_way_tags(&mut record, way, &RouteNetworks::default())
            .expect("classifies");
        let properties = bus.properties();
        (
            PriorityCode::nearest(properties.priority(&record).expect("has priority")),
            Direction::BOTH.map(|d| properties.speed(d, &record)),
        )
    }

    #[test]
    fn access() {
        let (_, bus) = bus();
        assert_eq!(
            bus.access(&ReaderWay::new(1).with_tag("highway", "busway")),
            AccessVerdict::WAY
        );
        let closed = ReaderWay::new(2)
            .with_tag("highway", "residential")
            .with_tag("motor_vehicle", "no");
        assert_eq!(bus.access(&closed), AccessVerdict::SKIP);
        // psv is more specific than motor_vehicle
        assert_eq!(bus.access(&closed.with_tag("psv", "yes")), AccessVerdict::WAY);
        assert_eq!(
            bus.access(&ReaderWay::new(3).with_tag("highway", "track")),
            AccessVerdict::SKIP
        );
    }

    #[test]
    fn bus_lanes_are_preferred() {
        let (registry, bus) = bus();
        let primary = ReaderWay::new(1).with_tag("highway", "primary");
        assert_eq!(
            classify(&bus, &registry, &primary),
            (PriorityCode::Unchanged, [60.0, 60.0])
        );
        let lane = primary.clone().with_tag("lanes:bus", "1");
        assert_eq!(classify(&bus, &registry, &lane).0, PriorityCode::Prefer);
        let busway = primary.clone().with_tag("busway:right", "lane");
        assert_eq!(classify(&bus, &registry, &busway).0, PriorityCode::Prefer);
        let none = primary.with_tag("busway", "no");
        assert_eq!(classify(&bus, &registry, &none).0, PriorityCode::Unchanged);
    }

    #[test]
    fn roundabouts_are_oneway() {
        let (registry, bus) = bus();
        let way = ReaderWay::new(1)
            .with_tag("highway", "secondary")
            .with_tag("junction", "roundabout");
        assert_eq!(classify(&bus, &registry, &way).1, [55.0, 0.0]);
    }
}
