//! # Tag classifiers
//!
//! Turns the tags of map ways, nodes and relations into bit-packed edge records.
//!
//! An [`OsmParsers`] is built once from an [`EncodingConfig`]. It declares the generic
//! way properties and the properties of each configured [`Mode`](tagflags_encoding::Mode),
//! then seals the layout. Classification is read-only afterwards and runs in parallel:
//!
//! 1. the relation pass folds route relations into per-way [`RelationFlags`](tagflags_encoding::RelationFlags),
//! 2. the way pass writes one [`EdgeRecord`](tagflags_encoding::EdgeRecord) per way,
//! 3. nodes are checked for barriers and restriction relations become turn records.
//!
//! Timed access tags (`access:conditional` and friends) are kept in a
//! [`ConditionalStore`](tagflags_conditional::ConditionalStore) for time-dependent queries.

mod access;
mod area;
mod classifier;
mod config;
mod error;
mod generic;
pub mod modes;
mod orchestrator;
mod osm;
mod priority;
mod relation;
mod speed;
mod turn_restriction;

pub use access::{AccessRules, AccessVerdict, Oneway, WayAccess, vehicle_oneway};
pub use area::{AreaInfo, AreaLookup, BuiltinLegalSpeeds, LegalSpeeds, TagAreaLookup};
pub use classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks};
pub use config::{EncodingConfig, ModeConfig, ModeSettings};
pub use error::TagParseError;
pub use generic::{GenericProperties, beeline_ratio, road_class, slopes, surface};
pub use orchestrator::{ClassifiedBatch, OsmParsers, OsmParsersBuilder};
pub use osm::{
    MemberType, OsmBatch, ReaderNode, ReaderRelation, ReaderWay, RelationMember, Tagged,
    split_values,
};
pub use priority::WeightedPriority;
pub use relation::{RelationPass, merge_networks, relation_networks};
pub use speed::{FerrySpeed, parse_duration, parse_speed};
pub use turn_restriction::{RestrictionKind, TurnGraph, TurnRestriction, WayGraph};
