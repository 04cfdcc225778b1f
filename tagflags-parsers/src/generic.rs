//! Mode-independent way properties: road class, environment, surface, limits, geometry.

use crate::TagParseError;
use crate::access::FERRY_ROUTES;
use crate::area::{AreaInfo, LegalSpeeds};
use crate::classifier::{RouteNetworks, lookup};
use crate::osm::{ReaderWay, Tagged};
use crate::speed::max_speed;
use tagflags_encoding::values::{
    Country, RoadClass, RoadEnvironment, RouteNetwork, Smoothness, Surface, UrbanDensity,
};
use tagflags_encoding::{
    BooleanProperty, DecimalProperty, Direction, EdgeRecord, EnumProperty, EnumValue, PropertySpec,
    RegistryBuilder,
};
use tracing::debug;

const MAX_SPEED_BITS: u32 = 7;
const MAX_SPEED_FACTOR: f64 = 2.0;
const SLOPE_BITS: u32 = 5;
const SLOPE_MIN: f64 = -15.0;
const CURVATURE_BITS: u32 = 4;
const CURVATURE_FACTOR: f64 = 0.1;
/// Segments shorter than this are too noisy for the max slope.
const MIN_SLOPE_SEGMENT: f64 = 10.0;

const SURFACE_SYNONYMS: &[(&str, Surface)] = &[
    ("metal", Surface::Paved),
    ("sett", Surface::Cobblestone),
    ("unhewn_cobblestone", Surface::Cobblestone),
    ("pebblestone", Surface::Gravel),
    ("earth", Surface::Dirt),
    ("mud", Surface::Dirt),
    ("grass_paver", Surface::Grass),
    ("woodchips", Surface::Wood),
];

/// The `beeline / length` ratio of a way's geometry; `None` without a usable geometry.
pub fn beeline_ratio(way: &ReaderWay) -> Option<f64> {
    let length = way.length()?;
    if length <= 0.0 {
        return None;
    }
    Some(way.beeline()? / length)
}

/// The surface of a way, resolving synonyms and `paving_stones:30` style sub-values.
pub fn surface(way: &ReaderWay) -> Surface {
    let Some(value) = way.tag("surface") else {
        return Surface::Missing;
    };
    let value = value.split(':').next().unwrap_or(value);
    Surface::find(value)
        .filter(|s| *s != Surface::Missing)
        .or_else(|| lookup(SURFACE_SYNONYMS, value))
        .unwrap_or(Surface::Other)
}

/// The road class with `_link` roads folded into their parent, and whether it was a link.
pub fn road_class(way: &ReaderWay) -> (RoadClass, bool) {
    let Some(highway) = way.tag("highway") else {
        return (RoadClass::Other, false);
    };
    let (base, link) = match highway.strip_suffix("_link") {
        Some(base) => (base, true),
        None => (highway, false),
    };
    (RoadClass::find(base).unwrap_or_default(), link)
}

pub fn road_environment(way: &ReaderWay) -> RoadEnvironment {
    if way.has_tag_in("route", FERRY_ROUTES) {
        RoadEnvironment::Ferry
    } else if way.has_tag_in("tunnel", &["yes", "building_passage", "culvert"])
        || way.has_tag("covered", "yes")
    {
        RoadEnvironment::Tunnel
    } else if way.tag("bridge").is_some_and(|v| v != "no") {
        RoadEnvironment::Bridge
    } else if way.has_tag("ford", "yes") || way.has_tag("highway", "ford") {
        RoadEnvironment::Ford
    } else if way.tag("highway").is_some() {
        RoadEnvironment::Road
    } else {
        RoadEnvironment::Other
    }
}

pub fn is_roundabout(way: &ReaderWay) -> bool {
    way.has_tag_in("junction", &["roundabout", "circular"])
}

/// Average and steepest slope of a way in percent, in the forward direction.
///
/// Needs one elevation per coordinate.
pub fn slopes(way: &ReaderWay) -> Option<(f64, f64)> {
    if way.elevations.len() != way.coordinates.len() {
        return None;
    }
    let lengths = way.segment_lengths();
    let length: f64 = lengths.iter().sum();
    if length <= 0.0 {
        return None;
    }
    let (first, last) = (way.elevations.first()?, way.elevations.last()?);
    let average = (last - first) / length * 100.0;
    let steepest = lengths
        .iter()
        .zip(way.elevations.windows(2))
        .filter(|(l, _)| **l >= MIN_SLOPE_SEGMENT)
        .map(|(l, e)| (e[1] - e[0]) / l * 100.0)
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(average);
    Some((average, steepest))
}

/// The properties every edge carries regardless of the enabled modes.
#[derive(Debug, Clone)]
pub struct GenericProperties {
    pub roundabout: BooleanProperty,
    pub road_class: EnumProperty<RoadClass>,
    pub road_class_link: BooleanProperty,
    pub road_environment: EnumProperty<RoadEnvironment>,
    pub surface: EnumProperty<Surface>,
    pub smoothness: EnumProperty<Smoothness>,
    /// Signed or legal limit in km/h; zero when unknown.
    pub max_speed: DecimalProperty,
    pub max_speed_estimated: BooleanProperty,
    pub country: EnumProperty<Country>,
    pub urban_density: EnumProperty<UrbanDensity>,
    pub average_slope: DecimalProperty,
    pub max_slope: DecimalProperty,
    pub curvature: DecimalProperty,
    pub bike_network: EnumProperty<RouteNetwork>,
    pub mtb_network: EnumProperty<RouteNetwork>,
    pub foot_network: EnumProperty<RouteNetwork>,
}

impl GenericProperties {
    /// Declares the generic properties; they come first in every layout.
    ///
    /// # Errors
    ///
    /// Fails if any of the names is already declared.
    pub fn declare(builder: &mut RegistryBuilder) -> Result<Self, TagParseError> {
        let properties = Self {
            roundabout: builder.declare_boolean("roundabout", false)?,
            road_class: builder.declare_enum(RoadClass::KEY, false)?,
            road_class_link: builder.declare_boolean("road_class_link", false)?,
            road_environment: builder.declare_enum(RoadEnvironment::KEY, false)?,
            surface: builder.declare_enum(Surface::KEY, false)?,
            smoothness: builder.declare_enum(Smoothness::KEY, false)?,
            max_speed: builder.declare_decimal(PropertySpec::decimal(
                "max_speed",
                MAX_SPEED_BITS,
                MAX_SPEED_FACTOR,
                true,
            ))?,
            max_speed_estimated: builder.declare_boolean("max_speed_estimated", false)?,
            country: builder.declare_enum(Country::KEY, false)?,
            urban_density: builder.declare_enum(UrbanDensity::KEY, false)?,
            average_slope: builder.declare_decimal(
                PropertySpec::decimal("average_slope", SLOPE_BITS, 1.0, true).with_min(SLOPE_MIN),
            )?,
            max_slope: builder.declare_decimal(
                PropertySpec::decimal("max_slope", SLOPE_BITS, 1.0, true).with_min(SLOPE_MIN),
            )?,
            curvature: builder.declare_decimal(PropertySpec::decimal(
                "curvature",
                CURVATURE_BITS,
                CURVATURE_FACTOR,
                false,
            ))?,
            bike_network: builder.declare_enum(RouteNetwork::BIKE_KEY, false)?,
            mtb_network: builder.declare_enum(RouteNetwork::MTB_KEY, false)?,
            foot_network: builder.declare_enum(RouteNetwork::FOOT_KEY, false)?,
        };
        debug!("Declared generic way properties");
        Ok(properties)
    }

    /// Writes all generic properties of `way`.
    pub fn handle_way_tags(
        &self,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        networks: &RouteNetworks,
        area: AreaInfo,
        legal: &dyn LegalSpeeds,
    ) {
        let forward = Direction::Forward;
        self.roundabout.set(forward, record, is_roundabout(way));
        let (class, link) = road_class(way);
        self.road_class.set(forward, record, class);
        self.road_class_link.set(forward, record, link);
        self.road_environment
            .set(forward, record, road_environment(way));
        self.surface.set(forward, record, surface(way));
        let smoothness = way.tag("smoothness").map_or(Smoothness::Missing, |v| {
            Smoothness::find(v).unwrap_or(Smoothness::Other)
        });
        self.smoothness.set(forward, record, smoothness);
        self.country.set(forward, record, area.country);
        self.urban_density.set(forward, record, area.density);

        self.handle_max_speed(record, way, class, area, legal);

        let (average, steepest) = slopes(way).unwrap_or((0.0, 0.0));
        for (property, slope) in [(&self.average_slope, average), (&self.max_slope, steepest)] {
            property.set_clamped(Direction::Forward, record, slope);
            property.set_clamped(Direction::Backward, record, -slope);
        }
        let curvature = beeline_ratio(way)
            .filter(|r| (0.0..=1.0).contains(r))
            .unwrap_or(1.0);
        self.curvature.set_clamped(forward, record, curvature);

        self.bike_network.set(forward, record, networks.bike);
        self.mtb_network.set(forward, record, networks.mtb);
        self.foot_network.set(forward, record, networks.foot);
    }

    fn handle_max_speed(
        &self,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        class: RoadClass,
        area: AreaInfo,
        legal: &dyn LegalSpeeds,
    ) {
        let signed = Direction::BOTH.map(|d| max_speed(way, d));
        if signed.iter().any(Option::is_some) {
            for (direction, limit) in Direction::BOTH.into_iter().zip(signed) {
                self.max_speed
                    .set_clamped(direction, record, limit.unwrap_or_default());
            }
            return;
        }
        if let Some(limit) = legal.legal_max_speed(area.country, class, area.density) {
            for direction in Direction::BOTH {
                self.max_speed.set_clamped(direction, record, limit);
            }
            self.max_speed_estimated.set(Direction::Forward, record, true);
        }
    }
}
