use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, ONEWAY_VALUES, Oneway};
use crate::classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks, lookup};
use crate::config::ModeSettings;
use crate::modes::car::RESTRICTED_VALUES;
use crate::osm::{ReaderNode, ReaderWay, Tagged};
use crate::priority::WeightedPriority;
use crate::speed::{FerrySpeed, max_speed, max_speed_both};
use tagflags_conditional::ConditionalTagInspector;
use tagflags_encoding::values::{RouteNetwork, Smoothness};
use tagflags_encoding::{Direction, EdgeRecord, EnumValue, Mode, PriorityCode, RegistryBuilder};
use tracing::debug;

const RESTRICTIONS: &[&str] = &["bicycle", "vehicle", "access"];
const INTENDED_VALUES: &[&str] = &["yes", "designated", "official", "permissive"];
const ABSOLUTE_BARRIERS: &[&str] = &["fence", "wall", "kissing_gate", "stile", "turnstile"];
const POTENTIAL_BARRIERS: &[&str] = &["gate", "lift_gate", "swing_gate", "chain"];

/// Highways where cyclists usually have to dismount.
const PUSHING_SECTIONS: &[&str] = &["footway", "pedestrian", "steps", "platform"];
const OPPOSITE_LANES: &[&str] = &["opposite", "opposite_lane", "opposite_track"];
const UNPAVED_SURFACES: &[&str] = &[
    "unpaved",
    "gravel",
    "ground",
    "dirt",
    "grass",
    "compacted",
    "earth",
    "fine_gravel",
    "grass_paver",
    "ice",
    "mud",
    "salt",
    "sand",
    "wood",
];

const PUSHING_SECTION_SPEED: f64 = 4.0;
const MIN_SPEED: f64 = 2.0;
/// Shared by `highway=cycleway` and paths designated for bicycles.
const CYCLEWAY_SPEED: f64 = 18.0;
/// Speed on pushing sections where cycling is merely tolerated (`bicycle=yes`).
const TOLERATED_SPEED: f64 = 10.0;
/// Roads with car limits from here on are avoided.
const AVOID_SPEED_LIMIT: f64 = 71.0;

const SMOOTHNESS_FACTORS: &[(Smoothness, f64)] = &[
    (Smoothness::Missing, 1.0),
    (Smoothness::Other, 0.7),
    (Smoothness::Excellent, 1.1),
    (Smoothness::Good, 1.0),
    (Smoothness::Intermediate, 0.9),
    (Smoothness::Bad, 0.7),
    (Smoothness::VeryBad, 0.4),
    (Smoothness::Horrible, 0.3),
    (Smoothness::VeryHorrible, 0.1),
    (Smoothness::Impassable, 0.0),
];

/// The rule tables of one bicycle profile.
#[derive(Debug)]
struct BikeTables {
    highway_speeds: &'static [(&'static str, f64)],
    surface_speeds: &'static [(&'static str, f64)],
    tracktype_speeds: &'static [(&'static str, f64)],
    prefer_highways: &'static [&'static str],
    avoid_highways: &'static [&'static str],
    /// Highways only used when explicitly tagged for bicycles.
    tagged_only: &'static [&'static str],
    sac_scales: &'static [&'static str],
    class_key: &'static str,
    avoid_unpaved: bool,
}

static BIKE: BikeTables = BikeTables {
    highway_speeds: &[
        ("living_street", 4.0),
        ("steps", 2.0),
        ("cycleway", CYCLEWAY_SPEED),
        ("path", 10.0),
        ("footway", 6.0),
        ("platform", 4.0),
        ("pedestrian", 4.0),
        ("track", 12.0),
        ("service", 14.0),
        ("residential", 18.0),
        ("unclassified", 16.0),
        ("road", 12.0),
        ("trunk", 18.0),
        ("trunk_link", 18.0),
        ("primary", 18.0),
        ("primary_link", 18.0),
        ("secondary", 18.0),
        ("secondary_link", 18.0),
        ("tertiary", 18.0),
        ("tertiary_link", 18.0),
        ("motorway", 18.0),
        ("motorway_link", 18.0),
        ("bridleway", 4.0),
    ],
    surface_speeds: &[
        ("paved", 18.0),
        ("asphalt", 18.0),
        ("cobblestone", 8.0),
        ("cobblestone:flattened", 10.0),
        ("sett", 10.0),
        ("concrete", 18.0),
        ("concrete:lanes", 16.0),
        ("concrete:plates", 16.0),
        ("paving_stones", 14.0),
        ("paving_stones:30", 14.0),
        ("unpaved", 12.0),
        ("compacted", 14.0),
        ("dirt", 10.0),
        ("earth", 12.0),
        ("fine_gravel", 18.0),
        ("grass", 8.0),
        ("grass_paver", 8.0),
        ("gravel", 12.0),
        ("ground", 12.0),
        ("ice", MIN_SPEED),
        ("metal", 10.0),
        ("mud", 10.0),
        ("pebblestone", 14.0),
        ("salt", PUSHING_SECTION_SPEED),
        ("sand", PUSHING_SECTION_SPEED),
        ("wood", PUSHING_SECTION_SPEED),
    ],
    tracktype_speeds: &[
        ("grade1", 18.0),
        ("grade2", 12.0),
        ("grade3", 8.0),
        ("grade4", 6.0),
        ("grade5", 4.0),
    ],
    prefer_highways: &[
        "service",
        "tertiary",
        "tertiary_link",
        "residential",
        "unclassified",
    ],
    avoid_highways: &[
        "trunk",
        "trunk_link",
        "primary",
        "primary_link",
        "secondary",
        "secondary_link",
        "motorway",
        "motorway_link",
        "bridleway",
        "steps",
    ],
    tagged_only: &["motorway", "motorway_link", "bridleway"],
    sac_scales: &["hiking"],
    class_key: "class:bicycle:touring",
    avoid_unpaved: false,
};

static MOUNTAIN_BIKE: BikeTables = BikeTables {
    highway_speeds: &[
        ("living_street", 6.0),
        ("steps", 4.0),
        ("cycleway", CYCLEWAY_SPEED),
        ("path", 18.0),
        ("footway", 6.0),
        ("platform", 6.0),
        ("pedestrian", 6.0),
        ("track", 18.0),
        ("service", 14.0),
        ("residential", 16.0),
        ("unclassified", 16.0),
        ("road", 12.0),
        ("trunk", 18.0),
        ("trunk_link", 18.0),
        ("primary", 18.0),
        ("primary_link", 18.0),
        ("secondary", 18.0),
        ("secondary_link", 18.0),
        ("tertiary", 18.0),
        ("tertiary_link", 18.0),
        ("motorway", 18.0),
        ("motorway_link", 18.0),
        ("bridleway", 10.0),
    ],
    surface_speeds: &[
        ("paved", 18.0),
        ("asphalt", 18.0),
        ("cobblestone", 10.0),
        ("cobblestone:flattened", 10.0),
        ("sett", 10.0),
        ("concrete", 18.0),
        ("concrete:lanes", 16.0),
        ("concrete:plates", 16.0),
        ("paving_stones", 14.0),
        ("paving_stones:30", 14.0),
        ("unpaved", 16.0),
        ("compacted", 16.0),
        ("dirt", 16.0),
        ("earth", 16.0),
        ("fine_gravel", 18.0),
        ("grass", 14.0),
        ("grass_paver", 14.0),
        ("gravel", 16.0),
        ("ground", 16.0),
        ("ice", MIN_SPEED),
        ("metal", 10.0),
        ("mud", 10.0),
        ("pebblestone", 16.0),
        ("salt", 6.0),
        ("sand", 10.0),
        ("wood", 10.0),
    ],
    tracktype_speeds: &[
        ("grade1", 18.0),
        ("grade2", 16.0),
        ("grade3", 12.0),
        ("grade4", 8.0),
        ("grade5", 6.0),
    ],
    prefer_highways: &["track", "path", "service", "residential", "unclassified"],
    avoid_highways: &[
        "trunk",
        "trunk_link",
        "primary",
        "primary_link",
        "secondary",
        "secondary_link",
        "motorway",
        "motorway_link",
        "steps",
    ],
    tagged_only: &["motorway", "motorway_link"],
    sac_scales: &[
        "hiking",
        "mountain_hiking",
        "demanding_mountain_hiking",
        "alpine_hiking",
    ],
    class_key: "class:bicycle:mtb",
    avoid_unpaved: false,
};

static RACING_BIKE: BikeTables = BikeTables {
    highway_speeds: &[
        ("living_street", 4.0),
        ("steps", 2.0),
        ("cycleway", CYCLEWAY_SPEED),
        ("path", 8.0),
        ("footway", 4.0),
        ("platform", 2.0),
        ("pedestrian", 4.0),
        ("track", 6.0),
        ("service", 12.0),
        ("residential", 18.0),
        ("unclassified", 16.0),
        ("road", 12.0),
        ("trunk", 20.0),
        ("trunk_link", 20.0),
        ("primary", 20.0),
        ("primary_link", 20.0),
        ("secondary", 20.0),
        ("secondary_link", 20.0),
        ("tertiary", 20.0),
        ("tertiary_link", 20.0),
        ("motorway", 20.0),
        ("motorway_link", 20.0),
        ("bridleway", 2.0),
    ],
    surface_speeds: &[
        ("paved", 20.0),
        ("asphalt", 20.0),
        ("cobblestone", 6.0),
        ("cobblestone:flattened", 8.0),
        ("sett", 8.0),
        ("concrete", 20.0),
        ("concrete:lanes", 16.0),
        ("concrete:plates", 16.0),
        ("paving_stones", 10.0),
        ("paving_stones:30", 10.0),
        ("unpaved", 6.0),
        ("compacted", 10.0),
        ("dirt", 4.0),
        ("earth", 4.0),
        ("fine_gravel", 10.0),
        ("grass", 2.0),
        ("grass_paver", 4.0),
        ("gravel", 6.0),
        ("ground", 4.0),
        ("ice", MIN_SPEED),
        ("metal", 6.0),
        ("mud", 2.0),
        ("pebblestone", 6.0),
        ("salt", 2.0),
        ("sand", 2.0),
        ("wood", 4.0),
    ],
    tracktype_speeds: &[
        ("grade1", 20.0),
        ("grade2", 10.0),
        ("grade3", 4.0),
        ("grade4", 2.0),
        ("grade5", 2.0),
    ],
    prefer_highways: &[
        "residential",
        "unclassified",
        "tertiary",
        "tertiary_link",
        "secondary",
        "secondary_link",
    ],
    avoid_highways: &[
        "trunk",
        "trunk_link",
        "motorway",
        "motorway_link",
        "bridleway",
        "steps",
    ],
    tagged_only: &["motorway", "motorway_link", "bridleway"],
    sac_scales: &[],
    class_key: "class:bicycle:roadcycling",
    avoid_unpaved: true,
};

/// Bicycles, mountain bikes and racing bikes.
///
/// The profiles share one rule chain and differ in their tables.
#[derive(Debug)]
pub struct BikeClassifier {
    mode: Mode,
    tables: &'static BikeTables,
    rules: AccessRules,
    properties: ModeProperties,
    inspector: ConditionalTagInspector,
    ferry: FerrySpeed,
}

impl BikeClassifier {
    /// Declares the properties of one of the bicycle modes.
    ///
    /// # Errors
    ///
    /// Fails if `settings` is not for a bicycle mode or the properties cannot be declared.
    pub fn new(
        builder: &mut RegistryBuilder,
        settings: &ModeSettings,
        context: &ClassifierContext,
    ) -> Result<Self, TagParseError> {
        let tables = match settings.mode {
            Mode::Bike => &BIKE,
            Mode::MountainBike => &MOUNTAIN_BIKE,
            Mode::RacingBike => &RACING_BIKE,
            other => {
                return Err(TagParseError::InvalidConfig {
                    reason: format!("{other} is not a bicycle mode"),
                });
            }
        };
        let rules = AccessRules::new(
            RESTRICTIONS,
            RESTRICTED_VALUES,
            INTENDED_VALUES,
            settings.block_private,
            settings.block_fords,
        )
        .with_barriers(ABSOLUTE_BARRIERS, POTENTIAL_BARRIERS);
        Ok(Self {
            mode: settings.mode,
            tables,
            inspector: context.inspector(&rules),
            properties: ModeProperties::declare(builder, settings, true)?,
            rules,
            ferry: FerrySpeed::default(),
        })
    }

    pub fn properties(&self) -> &ModeProperties {
        &self.properties
    }

    fn bicycle_intended(&self, way: &ReaderWay) -> bool {
        way.tag_values("bicycle")
            .iter()
            .any(|v| self.rules.intended_values.contains(*v))
    }

    fn highway_speed(&self, highway: &str) -> Option<f64> {
        lookup(self.tables.highway_speeds, highway)
    }

    /// The speed implied by the way's class and surface, before limits and smoothness.
    fn base_speed(&self, way: &ReaderWay) -> f64 {
        let highway = way.tag("highway").unwrap_or_default();
        let pushing_highway = PUSHING_SECTIONS.contains(&highway);
        let designated = way.has_tag_in("bicycle", &["designated", "official"]);
        let segregated = way.has_tag("segregated", "yes");

        let mut highway_speed = self.highway_speed(highway);
        if (pushing_highway && ((way.has_tag("foot", "yes") && segregated) || self.bicycle_intended(way)))
            || (highway == "path" && designated)
        {
            highway_speed = Some(CYCLEWAY_SPEED);
        }
        if way.tag("service").is_some() && highway == "service" {
            highway_speed = self.highway_speed("living_street");
        }

        let mut speed = highway_speed.unwrap_or(PUSHING_SECTION_SPEED);
        let tracktype = way
            .tag("tracktype")
            .and_then(|t| lookup(self.tables.tracktype_speeds, t));
        let surface_speed = way
            .tag("surface")
            .and_then(|s| lookup(self.tables.surface_speeds, s));
        match (highway, tracktype, surface_speed) {
            ("track", Some(tracktype), _) => speed = tracktype,
            (_, _, Some(surface)) => {
                // good surfaces do not speed up pushing sections
                if !(pushing_highway && surface > speed) {
                    speed = surface;
                }
            }
            _ => {}
        }

        let dismount = way.has_tag("bicycle", "dismount");
        if speed > PUSHING_SECTION_SPEED && (pushing_highway || dismount) {
            if !self.bicycle_intended(way) || dismount {
                speed = if highway == "steps" {
                    MIN_SPEED
                } else {
                    PUSHING_SECTION_SPEED
                };
            } else if designated || segregated || way.has_tag("bicycle", "yes") {
                speed = if designated || segregated {
                    CYCLEWAY_SPEED
                } else {
                    TOLERATED_SPEED
                };
                if let Some(surface) = surface_speed {
                    speed = speed.min(surface);
                }
            }
        }
        speed
    }

    /// Applies the signed limit of `direction` (only ever lowering) and smoothness.
    fn directed_speed(&self, way: &ReaderWay, base: f64, direction: Direction) -> f64 {
        let mut speed = base;
        if let Some(limit) = max_speed(way, direction) {
            speed = speed.min(limit);
        }
        let smoothness = way
            .tag("smoothness")
            .map(|s| Smoothness::find(s).unwrap_or(Smoothness::Other))
            .unwrap_or_default();
        let factor = lookup_smoothness(smoothness);
        (speed * factor).max(MIN_SPEED)
    }

    fn network(&self, networks: &RouteNetworks) -> RouteNetwork {
        match self.mode {
            Mode::MountainBike => networks.mtb.prefer(networks.bike),
            _ => networks.bike,
        }
    }

    /// # Errors
    ///
    /// Fails if a `class:bicycle` tag is not an integer.
    fn priority(
        &self,
        way: &ReaderWay,
        speed: f64,
        networks: &RouteNetworks,
    ) -> Result<WeightedPriority, TagParseError> {
        let tables = self.tables;
        let highway = way.tag("highway").unwrap_or_default();
        let mut priority = WeightedPriority::new();

        match self.network(networks) {
            RouteNetwork::International | RouteNetwork::National => {
                priority.put(110, PriorityCode::Best);
            }
            RouteNetwork::Regional => priority.put(110, PriorityCode::VeryNice),
            RouteNetwork::Local => priority.put(110, PriorityCode::Prefer),
            RouteNetwork::Missing | RouteNetwork::Other => {}
        }

        let designated = way.has_tag_in("bicycle", &["designated", "official"]);
        let segregated = way.has_tag("segregated", "yes");
        if highway == "cycleway" || (highway == "path" && designated) {
            let shared = way.has_tag_in("foot", INTENDED_VALUES) && !segregated;
            priority.put(
                100,
                if shared {
                    PriorityCode::Prefer
                } else {
                    PriorityCode::VeryNice
                },
            );
        } else if designated {
            priority.put(100, PriorityCode::Prefer);
        }

        let limit = max_speed_both(way);
        let tunnel = way.has_tag_in("tunnel", INTENDED_VALUES);
        if tables.prefer_highways.contains(&highway) || limit.is_some_and(|l| l <= 30.0) {
            if limit.is_none_or(|l| l < AVOID_SPEED_LIMIT) {
                priority.put(
                    40,
                    if tunnel {
                        PriorityCode::Unchanged
                    } else {
                        PriorityCode::Prefer
                    },
                );
            }
        } else if tables.avoid_highways.contains(&highway)
            || (limit.is_some_and(|l| l >= AVOID_SPEED_LIMIT) && highway != "track")
        {
            let mut code = PriorityCode::Avoid;
            if tunnel || way.has_tag_in("hazmat", INTENDED_VALUES) {
                code = code.worse().worse();
            }
            priority.put(50, code);
        }

        match way.first_priority_tag(&["cycleway", "cycleway:left", "cycleway:right", "cycleway:both"]) {
            Some("track") => priority.put(100, PriorityCode::Prefer),
            Some("lane" | "shared_lane" | "share_busway" | "shoulder") => {
                priority.put(100, PriorityCode::SlightPrefer);
            }
            _ => {}
        }

        if way.has_tag("bicycle", "use_sidepath") {
            priority.put(100, PriorityCode::ReachDestination);
        }

        if PUSHING_SECTIONS.contains(&highway) || way.has_tag("service", "parking_aisle") {
            let mut code = if designated {
                PriorityCode::VeryNice
            } else if way.has_tag_in("bicycle", &["yes", "permissive"]) {
                PriorityCode::Prefer
            } else if highway == "steps" {
                PriorityCode::Bad
            } else {
                PriorityCode::SlightAvoid
            };
            if way.has_tag("foot", "yes") && !segregated {
                code = code.worse();
            }
            priority.put(100, code);
        }

        if way.has_tag("railway", "tram") {
            priority.put(50, PriorityCode::AvoidMore);
        }
        if way.has_tag("lcn", "yes") {
            priority.put(100, PriorityCode::Prefer);
        }
        if tables.avoid_unpaved
            && (way.has_tag_in("surface", UNPAVED_SURFACES)
                || (highway == "track" && !way.has_tag("tracktype", "grade1")))
        {
            priority.put(120, PriorityCode::AvoidMore);
        }

        // a limit below the way's own speed is compensated with a bonus
        if way.has_tag("scenic", "yes") || limit.is_some_and(|l| l < speed) {
            let current = priority.current();
            if current != PriorityCode::ReachDestination {
                priority.put(130, current.better());
            }
        }

        let class_key = [tables.class_key, "class:bicycle"]
            .into_iter()
            .find(|key| way.tag(key).is_some());
        if let Some(key) = class_key {
            let value = way.tag(key).unwrap_or_default();
            let class = value
                .trim()
                .parse::<i32>()
                .map_err(|_| TagParseError::InvalidNumber {
                    key: key.to_owned(),
                    value: value.to_owned(),
                })?;
            priority.override_with(PriorityCode::from_class_value(class));
        }
        Ok(priority)
    }
}

fn lookup_smoothness(smoothness: Smoothness) -> f64 {
    SMOOTHNESS_FACTORS
        .iter()
        .find(|(s, _)| *s == smoothness)
        .map_or(1.0, |(_, f)| *f)
}

/// Oneway handling for bicycles: `oneway:bicycle`, cycleway oneways and contraflow lanes.
fn bike_oneway(way: &ReaderWay, rules: &AccessRules) -> Oneway {
    let restricted = |key: &str| rules.restricts(way, key);
    let intended = |key: &str| {
        way.tag_values(key)
            .iter()
            .any(|v| rules.intended_values.contains(*v))
    };
    let cycleway_oneway = |values: &[&str]| {
        way.has_any_tag_in(&["cycleway:left:oneway", "cycleway:right:oneway"], values)
    };
    let reverse = way.has_tag("oneway", "-1");
    let oneway = (way.has_tag_in("oneway", ONEWAY_VALUES) && !reverse && !intended("bicycle:backward"))
        || (reverse && !intended("bicycle:forward"))
        || way.has_tag_in("oneway:bicycle", ONEWAY_VALUES)
        || cycleway_oneway(ONEWAY_VALUES)
        || (restricted("vehicle:backward") && !intended("bicycle:forward"))
        || (restricted("vehicle:forward") && !intended("bicycle:backward"))
        || restricted("bicycle:forward")
        || restricted("bicycle:backward");
    let roundabout = way.has_tag_in("junction", &["roundabout", "circular"]);
    let exempt = way.has_tag("oneway:bicycle", "no")
        || way.has_any_tag_in(&["cycleway", "cycleway:left", "cycleway:right"], OPPOSITE_LANES)
        || cycleway_oneway(&["no"]);
    if !(oneway || roundabout) || exempt {
        return Oneway::Both;
    }
    let backward = reverse
        || way.has_tag("oneway:bicycle", "-1")
        || cycleway_oneway(&["-1"])
        || restricted("vehicle:forward")
        || restricted("bicycle:forward");
    if backward {
        Oneway::Backward
    } else {
        Oneway::Forward
    }
}

impl ModeClassifier for BikeClassifier {
    fn mode(&self) -> Mode {
        self.mode
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
        if self.highway_speed(highway).is_none() {
            return AccessVerdict::SKIP;
        }
        if way
            .tag("sac_scale")
            .is_some_and(|s| !self.tables.sac_scales.contains(&s))
        {
            return AccessVerdict::SKIP;
        }
        if self.bicycle_intended(way) || way.has_tag("bicycle", "dismount") || highway == "cycleway" {
            return AccessVerdict::WAY.with_conditional(self.inspector.has_conditional(&way.tags));
        }
        if self.tables.tagged_only.contains(&highway) || way.has_tag("motorroad", "yes") {
            return AccessVerdict::SKIP;
        }
        self.rules.way_access(way, &self.inspector)
    }

    fn handle_way_tags(
        &self,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        networks: &RouteNetworks,
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
            self.properties
                .set_priority(record, PriorityCode::SlightAvoid.factor());
            return Ok(verdict);
        }
        let base = self.base_speed(way);
        let speeds = Direction::BOTH.map(|d| self.directed_speed(way, base, d));
        self.properties
            .apply(record, bike_oneway(way, &self.rules), speeds);
        let priority = self.priority(way, base, networks)?;
        debug!(way = way.id, mode = %self.mode, priority = %priority.resolve(), "bike priority");
        self.properties.set_priority(record, priority.factor());
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
    use super::BikeClassifier;
    use crate::TagParseError;
    use crate::access::AccessVerdict;
    use crate::classifier::{ModeClassifier, RouteNetworks};
    use crate::config::{ModeConfig, ModeSettings};
    use crate::modes::test_context;
    use crate::osm::{ReaderNode, ReaderWay};
    use tagflags_encoding::values::RouteNetwork;
    use tagflags_encoding::{Direction, Mode, PriorityCode, PropertyRegistry, RegistryBuilder};

    fn bike(mode: Mode) -> (PropertyRegistry, BikeClassifier) {
        let settings = ModeSettings::resolve(&ModeConfig::new(mode)).expect("valid settings");
        let mut builder = RegistryBuilder::new();
        let bike = BikeClassifier::new(&mut builder, &settings, &test_context()).expect("declares");
        (builder.seal(), bike)
    }

    /// The stored priority code and forward speed.
    fn classify_with(
        bike: &BikeClassifier,
        registry: &PropertyRegistry,
        way: &ReaderWay,
        networks: &RouteNetworks,
    ) -> (PriorityCode, f64) {
        let mut record = registry.create_record();
        bike.handle_way_tags(&mut record, way, networks)
            .expect("classifies");
        let priority = bike.properties().priority(&record).expect("has priority");
        (
            PriorityCode::nearest(priority),
            bike.properties().speed(Direction::Forward, &record),
        )
    }

    fn classify(bike: &BikeClassifier, registry: &PropertyRegistry, way: &ReaderWay) -> (PriorityCode, f64) {
        classify_with(bike, registry, way, &RouteNetworks::default())
    }

    fn way(tags: &[(&str, &str)]) -> ReaderWay {
        tags.iter()
            .fold(ReaderWay::new(1), |way, (k, v)| way.with_tag(k, v))
    }

    #[test]
    fn cycleways_and_designated_paths_agree() {
        let (registry, bike) = bike(Mode::Bike);
        let cycleway = classify(&bike, &registry, &way(&[("highway", "cycleway")]));
        let path = classify(
            &bike,
            &registry,
            &way(&[("highway", "path"), ("bicycle", "designated")]),
        );
        assert_eq!(cycleway, (PriorityCode::VeryNice, 18.0));
        assert_eq!(path, cycleway);

        let no_foot = classify(
            &bike,
            &registry,
            &way(&[("highway", "cycleway"), ("foot", "no")]),
        );
        assert_eq!(no_foot, cycleway);

        let shared = classify(
            &bike,
            &registry,
            &way(&[("highway", "cycleway"), ("foot", "yes")]),
        );
        assert_eq!(shared, (PriorityCode::Prefer, 18.0));
    }

    #[test]
    fn speeds_and_priorities() {
        let (registry, bike) = bike(Mode::Bike);
        assert_eq!(
            classify(&bike, &registry, &way(&[("highway", "primary")])),
            (PriorityCode::Avoid, 18.0)
        );
        assert_eq!(
            classify(&bike, &registry, &way(&[("highway", "footway")])),
            (PriorityCode::SlightAvoid, 4.0)
        );
        assert_eq!(
            classify(&bike, &registry, &way(&[("highway", "steps")])),
            (PriorityCode::Bad, 2.0)
        );
        assert_eq!(
            classify(&bike, &registry, &way(&[("highway", "track")])),
            (PriorityCode::Unchanged, 12.0)
        );
        assert_eq!(
            classify(
                &bike,
                &registry,
                &way(&[("highway", "track"), ("tracktype", "grade1")])
            ),
            (PriorityCode::Unchanged, 18.0)
        );
        // the tracktype wins over the surface on tracks
        assert_eq!(
            classify(
                &bike,
                &registry,
                &way(&[("highway", "track"), ("tracktype", "grade3"), ("surface", "asphalt")])
            ),
            (PriorityCode::Unchanged, 8.0)
        );
        assert_eq!(
            classify(
                &bike,
                &registry,
                &way(&[
                    ("highway", "platform"),
                    ("surface", "paved"),
                    ("bicycle", "designated")
                ])
            ),
            (PriorityCode::VeryNice, 18.0)
        );
        assert_eq!(
            classify(
                &bike,
                &registry,
                &way(&[("highway", "residential"), ("surface", "cobblestone")])
            ),
            (PriorityCode::Prefer, 8.0)
        );
    }

    #[test]
    fn smoothness_and_limits() {
        let (registry, bike) = bike(Mode::Bike);
        let impassable = way(&[
            ("highway", "residential"),
            ("surface", "asphalt"),
            ("smoothness", "impassable"),
        ]);
        assert_eq!(classify(&bike, &registry, &impassable).1, 2.0);

        let bad = way(&[("highway", "residential"), ("smoothness", "bad")]);
        // 18 * 0.7 = 12.6, stored in steps of 2
        assert_eq!(classify(&bike, &registry, &bad).1, 12.0);

        // a limit below the bike speed slows it down and earns a bonus
        let limited = way(&[("highway", "residential"), ("maxspeed", "10")]);
        assert_eq!(
            classify(&bike, &registry, &limited),
            (PriorityCode::VeryNice, 10.0)
        );

        // preferred classes lose their bonus with fast traffic
        let fast = way(&[("highway", "unclassified"), ("maxspeed", "80")]);
        assert_eq!(classify(&bike, &registry, &fast).0, PriorityCode::Unchanged);
        let fast_road = way(&[("highway", "road"), ("maxspeed", "80")]);
        assert_eq!(classify(&bike, &registry, &fast_road).0, PriorityCode::Avoid);

        let tunnel = way(&[("highway", "primary"), ("tunnel", "yes")]);
        assert_eq!(classify(&bike, &registry, &tunnel).0, PriorityCode::Bad);
    }

    #[test]
    fn networks_and_explicit_classes() {
        let (registry, bike) = bike(Mode::Bike);
        let primary = way(&[("highway", "primary")]);
        let national = RouteNetworks {
            bike: RouteNetwork::National,
            ..RouteNetworks::default()
        };
        assert_eq!(
            classify_with(&bike, &registry, &primary, &national).0,
            PriorityCode::Best
        );

        let classed = primary.clone().with_tag("class:bicycle", "-2");
        assert_eq!(
            classify_with(&bike, &registry, &classed, &national).0,
            PriorityCode::Avoid
        );
        let touring = classed.with_tag("class:bicycle:touring", "3");
        assert_eq!(classify(&bike, &registry, &touring).0, PriorityCode::Best);

        let sidepath = way(&[("highway", "secondary"), ("bicycle", "use_sidepath")]);
        assert_eq!(
            classify(&bike, &registry, &sidepath).0,
            PriorityCode::ReachDestination
        );
    }

    #[test]
    fn malformed_classes_are_errors() {
        let (registry, bike) = bike(Mode::Bike);
        let mut record = registry.create_record();
        let err = bike
            .handle_way_tags(
                &mut record,
                &way(&[("highway", "primary"), ("class:bicycle", "lots")]),
                &RouteNetworks::default(),
            )
            .expect_err("not a number");
        assert_eq!(
            err,
            TagParseError::InvalidNumber {
                key: "class:bicycle".to_owned(),
                value: "lots".to_owned()
            }
        );
    }

    #[test]
    fn access() {
        let (_, bike) = bike(Mode::Bike);
        assert_eq!(bike.access(&way(&[("highway", "motorway")])), AccessVerdict::SKIP);
        assert_eq!(
            bike.access(&way(&[("highway", "motorway"), ("bicycle", "yes")])),
            AccessVerdict::WAY
        );
        assert_eq!(
            bike.access(&way(&[("highway", "path"), ("sac_scale", "alpine_hiking")])),
            AccessVerdict::SKIP
        );
        assert_eq!(
            bike.access(&way(&[("highway", "service"), ("access", "no")])),
            AccessVerdict::SKIP
        );
        assert_eq!(
            bike.access(&way(&[("highway", "service"), ("access", "no"), ("bicycle", "dismount")])),
            AccessVerdict::WAY
        );
        assert_eq!(bike.access(&way(&[("railway", "platform")])), AccessVerdict::WAY);
        assert_eq!(
            bike.access(&way(&[("route", "ferry"), ("foot", "yes")])),
            AccessVerdict::SKIP
        );
        assert_eq!(
            bike.access(&way(&[("route", "ferry"), ("bicycle", "yes")])),
            AccessVerdict::FERRY
        );

        let (_, mtb) = self::bike(Mode::MountainBike);
        assert_eq!(
            mtb.access(&way(&[("highway", "path"), ("sac_scale", "alpine_hiking")])),
            AccessVerdict::WAY
        );
    }

    #[test]
    fn oneways_and_contraflow() {
        let (registry, bike) = bike(Mode::Bike);
        let directions = |way: &ReaderWay| {
            let mut record = registry.create_record();
            bike.handle_way_tags(&mut record, way, &RouteNetworks::default())
                .expect("classifies");
            Direction::BOTH.map(|d| bike.properties().has_access(d, &record))
        };
        let oneway = way(&[("highway", "residential"), ("oneway", "yes")]);
        assert_eq!(directions(&oneway), [true, false]);
        assert_eq!(
            directions(&oneway.clone().with_tag("oneway:bicycle", "no")),
            [true, true]
        );
        assert_eq!(
            directions(&oneway.with_tag("cycleway", "opposite_lane")),
            [true, true]
        );
        assert_eq!(
            directions(&way(&[("highway", "residential"), ("oneway:bicycle", "-1")])),
            [false, true]
        );
        assert_eq!(
            directions(&way(&[("highway", "residential"), ("junction", "roundabout")])),
            [true, false]
        );
    }

    #[test]
    fn profiles_differ() {
        let (registry, racing) = bike(Mode::RacingBike);
        assert_eq!(
            classify(&racing, &registry, &way(&[("highway", "secondary")])),
            (PriorityCode::Prefer, 20.0)
        );
        assert_eq!(
            classify(
                &racing,
                &registry,
                &way(&[("highway", "residential"), ("surface", "gravel")])
            ),
            (PriorityCode::AvoidMore, 6.0)
        );

        let (registry, mtb) = bike(Mode::MountainBike);
        let trail = way(&[("highway", "path"), ("surface", "ground")]);
        assert_eq!(classify(&mtb, &registry, &trail), (PriorityCode::Prefer, 16.0));
        let networks = RouteNetworks {
            mtb: RouteNetwork::Regional,
            ..RouteNetworks::default()
        };
        assert_eq!(
            classify_with(&mtb, &registry, &trail, &networks).0,
            PriorityCode::VeryNice
        );
    }

    #[test]
    fn barriers() {
        let (_, bike) = bike(Mode::Bike);
        assert!(bike.is_barrier(&ReaderNode::new(1).with_tag("barrier", "fence")));
        assert!(!bike.is_barrier(&ReaderNode::new(1).with_tag("barrier", "bollard")));
        assert!(!bike.is_barrier(&ReaderNode::new(1).with_tag("barrier", "gate")));
        assert!(bike.is_barrier(
            &ReaderNode::new(1)
                .with_tag("barrier", "gate")
                .with_tag("bicycle", "no")
        ));
    }
}
