use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, ONEWAY_VALUES, Oneway};
use crate::classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks};
use crate::config::ModeSettings;
use crate::osm::{ReaderNode, ReaderWay, Tagged};
use crate::priority::WeightedPriority;
use crate::speed::{FerrySpeed, max_speed_both};
use tagflags_conditional::ConditionalTagInspector;
use tagflags_encoding::values::RouteNetwork;
use tagflags_encoding::{EdgeRecord, Mode, PriorityCode, RegistryBuilder};

pub(crate) const RESTRICTIONS: &[&str] = &["foot", "access"];
pub(crate) const RESTRICTED_VALUES: &[&str] =
    &["no", "restricted", "military", "emergency", "private"];
pub(crate) const INTENDED_VALUES: &[&str] = &["yes", "designated", "official", "permissive"];
pub(crate) const ABSOLUTE_BARRIERS: &[&str] = &["fence", "wall"];
pub(crate) const POTENTIAL_BARRIERS: &[&str] = &["gate", "lift_gate", "swing_gate", "chain"];

pub(crate) const SIDEWALK_VALUES: &[&str] = &["yes", "both", "left", "right"];
pub(crate) const NO_SIDEWALK_VALUES: &[&str] = &["no", "none", "separate"];

pub(crate) const SAFE_HIGHWAYS: &[&str] = &[
    "footway",
    "path",
    "steps",
    "pedestrian",
    "living_street",
    "track",
    "residential",
    "service",
    "platform",
];
pub(crate) const AVOID_HIGHWAYS: &[&str] = &[
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
];
const OTHER_HIGHWAYS: &[&str] = &["cycleway", "unclassified", "road"];

pub(crate) const SLOW_SPEED: f64 = 2.0;
pub(crate) const MEAN_SPEED: f64 = 5.0;
pub(crate) const STEPS_SPEED: f64 = 3.0;

/// Walking and hiking differ in the trails they accept and how much they like signed routes.
#[derive(Debug)]
struct FootTables {
    sac_scales: &'static [&'static str],
    /// Priorities of international, national, regional and local routes.
    network_priorities: [PriorityCode; 4],
}

static FOOT: FootTables = FootTables {
    sac_scales: &["hiking", "mountain_hiking", "demanding_mountain_hiking"],
    network_priorities: [PriorityCode::Unchanged; 4],
};

static HIKING: FootTables = FootTables {
    sac_scales: &[
        "hiking",
        "mountain_hiking",
        "demanding_mountain_hiking",
        "alpine_hiking",
        "demanding_alpine_hiking",
        "difficult_alpine_hiking",
    ],
    network_priorities: [
        PriorityCode::Best,
        PriorityCode::Best,
        PriorityCode::VeryNice,
        PriorityCode::Prefer,
    ],
};

pub(crate) fn has_sidewalk(way: &ReaderWay) -> bool {
    way.has_any_tag_in(&["sidewalk", "sidewalk:both", "sidewalk:left", "sidewalk:right"], SIDEWALK_VALUES)
}

/// Pedestrian oneways: `oneway:foot`, `foot:forward`/`foot:backward`, and oneway steps.
pub(crate) fn foot_oneway(way: &ReaderWay) -> Oneway {
    let oneway = way.has_tag_in("oneway:foot", ONEWAY_VALUES)
        || way.tag("foot:backward").is_some()
        || way.tag("foot:forward").is_some()
        || (way.has_tag_in("oneway", ONEWAY_VALUES) && way.has_tag("highway", "steps"));
    if !oneway {
        return Oneway::Both;
    }
    let reverse = way.has_tag("oneway:foot", "-1")
        || way.has_tag("foot:backward", "yes")
        || way.has_tag("foot:forward", "no")
        || (way.has_tag("oneway", "-1") && way.has_tag("highway", "steps"));
    if reverse {
        Oneway::Backward
    } else {
        Oneway::Forward
    }
}

/// Pedestrians and hikers.
#[derive(Debug)]
pub struct FootClassifier {
    mode: Mode,
    tables: &'static FootTables,
    rules: AccessRules,
    properties: ModeProperties,
    inspector: ConditionalTagInspector,
    ferry: FerrySpeed,
}

impl FootClassifier {
    /// Declares the properties of the foot or hiking mode.
    ///
    /// # Errors
    ///
    /// Fails if `settings` is for another mode or the properties cannot be declared.
    pub fn new(
        builder: &mut RegistryBuilder,
        settings: &ModeSettings,
        context: &ClassifierContext,
    ) -> Result<Self, TagParseError> {
        let tables = match settings.mode {
            Mode::Foot => &FOOT,
            Mode::Hiking => &HIKING,
            other => {
                return Err(TagParseError::InvalidConfig {
                    reason: format!("{other} is not a pedestrian mode"),
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

    fn is_allowed_highway(highway: &str) -> bool {
        SAFE_HIGHWAYS.contains(&highway)
            || AVOID_HIGHWAYS.contains(&highway)
            || OTHER_HIGHWAYS.contains(&highway)
    }

    fn speed(way: &ReaderWay) -> f64 {
        match way.tag("sac_scale") {
            Some("hiking") => MEAN_SPEED,
            Some(_) => SLOW_SPEED,
            None if way.has_tag("highway", "steps") => STEPS_SPEED,
            None => MEAN_SPEED,
        }
    }

    fn priority(&self, way: &ReaderWay, networks: &RouteNetworks) -> WeightedPriority {
        let mut priority = pedestrian_priority(way, SAFE_HIGHWAYS, AVOID_HIGHWAYS);
        let network = match networks.foot {
            RouteNetwork::International => Some(self.tables.network_priorities[0]),
            RouteNetwork::National => Some(self.tables.network_priorities[1]),
            RouteNetwork::Regional => Some(self.tables.network_priorities[2]),
            RouteNetwork::Local => Some(self.tables.network_priorities[3]),
            RouteNetwork::Missing | RouteNetwork::Other => None,
        };
        if let Some(code) = network {
            priority.put(110, code);
        }
        priority
    }
}

/// Priority rules shared by walking and wheelchair routing.
pub(crate) fn pedestrian_priority(way: &ReaderWay, safe: &[&str], avoid: &[&str]) -> WeightedPriority {
    let mut priority = WeightedPriority::new();
    if way.has_tag("foot", "designated") {
        priority.put(100, PriorityCode::Prefer);
    }

    let highway = way.tag("highway").unwrap_or_default();
    let limit = max_speed_both(way);
    if safe.contains(&highway) || limit.is_some_and(|l| l <= 20.0) {
        let code = if !way.has_tag_in("tunnel", INTENDED_VALUES) {
            PriorityCode::Prefer
        } else if way.has_tag_in("sidewalk", NO_SIDEWALK_VALUES) {
            PriorityCode::SlightAvoid
        } else {
            PriorityCode::Unchanged
        };
        priority.put(40, code);
    } else if (limit.is_some_and(|l| l > 50.0) || avoid.contains(&highway)) && !has_sidewalk(way) {
        priority.put(45, PriorityCode::Avoid);
    }

    if way.has_tag_in("bicycle", &["official", "designated"]) {
        priority.put(44, PriorityCode::SlightAvoid);
    }
    priority
}

impl ModeClassifier for FootClassifier {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn access(&self, way: &ReaderWay) -> AccessVerdict {
        let conditional = self.inspector.has_conditional(&way.tags);
        let Some(highway) = way.tag("highway") else {
            if let Some(ferry) = self.rules.ferry(way) {
                return ferry;
            }
            if way.has_tag("railway", "platform") || way.has_tag("man_made", "pier") {
                return self.rules.way_access(way, &self.inspector);
            }
            return AccessVerdict::SKIP;
        };
        if way
            .tag("sac_scale")
            .is_some_and(|s| !self.tables.sac_scales.contains(&s))
        {
            return AccessVerdict::SKIP;
        }
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
        if !Self::is_allowed_highway(highway) || way.has_tag("motorroad", "yes") {
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
        } else {
            let speed = Self::speed(way);
            self.properties
                .apply(record, foot_oneway(way), [speed, speed]);
            self.properties
                .set_priority(record, self.priority(way, networks).factor());
        }
        Ok(verdict)
    }

    fn is_barrier(&self, node: &ReaderNode) -> bool {
        self.rules.is_barrier(node)
    }

    fn inspector(&self) -> &ConditionalTagInspector {
        &self.inspector
    }
}
