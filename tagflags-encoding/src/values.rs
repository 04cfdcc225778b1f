//! Small enumerations shared by the generic way classifiers and the per-mode classifiers.
//!
//! The zero ordinal of every enum is its "unknown" value,
//! so a freshly created record decodes to it.

use crate::macros::value_enum;

value_enum! {
    /// The `highway` class of a way, with `_link` roads folded into their parent class.
    pub enum RoadClass {
        #[default]
        Other => "other",
        Motorway => "motorway",
        Trunk => "trunk",
        Primary => "primary",
        Secondary => "secondary",
        Tertiary => "tertiary",
        Residential => "residential",
        Unclassified => "unclassified",
        Service => "service",
        Road => "road",
        Track => "track",
        Bridleway => "bridleway",
        Steps => "steps",
        Cycleway => "cycleway",
        Path => "path",
        LivingStreet => "living_street",
        Footway => "footway",
        Pedestrian => "pedestrian",
        Platform => "platform",
        Corridor => "corridor",
        Construction => "construction",
    }
}

impl RoadClass {
    pub const KEY: &'static str = "road_class";
}

value_enum! {
    pub enum RoadEnvironment {
        #[default]
        Other => "other",
        Road => "road",
        Ferry => "ferry",
        Tunnel => "tunnel",
        Bridge => "bridge",
        Ford => "ford",
    }
}

impl RoadEnvironment {
    pub const KEY: &'static str = "road_environment";
}

value_enum! {
    pub enum Surface {
        #[default]
        Missing => "missing",
        Paved => "paved",
        Asphalt => "asphalt",
        Concrete => "concrete",
        PavingStones => "paving_stones",
        Cobblestone => "cobblestone",
        Unpaved => "unpaved",
        Compacted => "compacted",
        FineGravel => "fine_gravel",
        Gravel => "gravel",
        Ground => "ground",
        Dirt => "dirt",
        Grass => "grass",
        Sand => "sand",
        Wood => "wood",
        Other => "other",
    }
}

impl Surface {
    pub const KEY: &'static str = "surface";
}

value_enum! {
    pub enum Smoothness {
        #[default]
        Missing => "missing",
        Excellent => "excellent",
        Good => "good",
        Intermediate => "intermediate",
        Bad => "bad",
        VeryBad => "very_bad",
        Horrible => "horrible",
        VeryHorrible => "very_horrible",
        Impassable => "impassable",
        Other => "other",
    }
}

impl Smoothness {
    pub const KEY: &'static str = "smoothness";
}

value_enum! {
    /// Route network tier from relation membership.
    ///
    /// Lower ordinals (after `Missing`) are more important networks.
    pub enum RouteNetwork {
        #[default]
        Missing => "missing",
        International => "international",
        National => "national",
        Regional => "regional",
        Local => "local",
        Other => "other",
    }
}

impl RouteNetwork {
    pub const BIKE_KEY: &'static str = "bike_network";
    pub const FOOT_KEY: &'static str = "foot_network";
    pub const MTB_KEY: &'static str = "mtb_network";

    /// Merges two contributions for the same way.
    ///
    /// `Missing` is the identity; otherwise the numerically lower tier wins.
    /// The merge is associative and commutative, so relations may be folded in any order.
    #[must_use]
    pub fn prefer(self, other: Self) -> Self {
        match (self, other) {
            (RouteNetwork::Missing, x) | (x, RouteNetwork::Missing) => x,
            (a, b) => {
                if u8::from(a) <= u8::from(b) {
                    a
                } else {
                    b
                }
            }
        }
    }
}

value_enum! {
    pub enum UrbanDensity {
        #[default]
        Rural => "rural",
        Residential => "residential",
        City => "city",
    }
}

impl UrbanDensity {
    pub const KEY: &'static str = "urban_density";
}

value_enum! {
    /// Countries with a built-in legal speed table (ISO 3166-1 alpha-3).
    pub enum Country {
        #[default]
        Missing => "missing",
        Aut => "AUT",
        Bel => "BEL",
        Can => "CAN",
        Che => "CHE",
        Cze => "CZE",
        Deu => "DEU",
        Dnk => "DNK",
        Esp => "ESP",
        Fra => "FRA",
        Gbr => "GBR",
        Ita => "ITA",
        Nld => "NLD",
        Pol => "POL",
        Usa => "USA",
    }
}

impl Country {
    pub const KEY: &'static str = "country";

    /// Whether signs in this country are in miles per hour.
    pub const fn uses_mph(self) -> bool {
        matches!(self, Country::Gbr | Country::Usa)
    }
}
