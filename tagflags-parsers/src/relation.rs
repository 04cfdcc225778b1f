//! The relation pass: route network memberships folded into per-way relation flags.

use crate::TagParseError;
use crate::classifier::{RouteNetworks, lookup};
use crate::osm::{ReaderRelation, Tagged};
use rayon::prelude::*;
use std::collections::HashMap;
use tagflags_encoding::values::RouteNetwork;
use tagflags_encoding::{Direction, EnumProperty, PropertyRegistry, RegistryBuilder, RelationFlags};

const BIKE_NETWORKS: &[(&str, RouteNetwork)] = &[
    ("icn", RouteNetwork::International),
    ("ncn", RouteNetwork::National),
    ("rcn", RouteNetwork::Regional),
    ("lcn", RouteNetwork::Local),
];

const FOOT_NETWORKS: &[(&str, RouteNetwork)] = &[
    ("iwn", RouteNetwork::International),
    ("nwn", RouteNetwork::National),
    ("rwn", RouteNetwork::Regional),
    ("lwn", RouteNetwork::Local),
];

const FOOT_ROUTES: &[&str] = &["hiking", "foot", "walking"];

fn network(relation: &ReaderRelation, table: &[(&str, RouteNetwork)]) -> RouteNetwork {
    relation
        .tag("network")
        .and_then(|value| lookup(table, value))
        .unwrap_or(RouteNetwork::Other)
}

/// The networks a single route relation contributes to its member ways.
pub fn relation_networks(relation: &ReaderRelation) -> RouteNetworks {
    let mut networks = RouteNetworks::default();
    if !relation.has_tag("type", "route") {
        return networks;
    }
    match relation.tag("route") {
        Some("bicycle") => networks.bike = network(relation, BIKE_NETWORKS),
        Some("mtb") => networks.mtb = network(relation, BIKE_NETWORKS),
        Some(route) if FOOT_ROUTES.contains(&route) => {
            networks.foot = network(relation, FOOT_NETWORKS);
        }
        _ => {}
    }
    networks
}

/// Merges two contributions; see [`RouteNetwork::prefer`].
pub fn merge_networks(a: RouteNetworks, b: RouteNetworks) -> RouteNetworks {
    RouteNetworks {
        bike: a.bike.prefer(b.bike),
        mtb: a.mtb.prefer(b.mtb),
        foot: a.foot.prefer(b.foot),
    }
}

/// Packs route network memberships into relation flag records.
#[derive(Debug)]
pub struct RelationPass {
    registry: PropertyRegistry,
    bike: EnumProperty<RouteNetwork>,
    mtb: EnumProperty<RouteNetwork>,
    foot: EnumProperty<RouteNetwork>,
}

impl RelationPass {
    /// # Errors
    ///
    /// Fails if the relation flag layout cannot be declared.
    pub fn new() -> Result<Self, TagParseError> {
        let mut builder = RegistryBuilder::new();
        let bike = builder.declare_enum(RouteNetwork::BIKE_KEY, false)?;
        let mtb = builder.declare_enum(RouteNetwork::MTB_KEY, false)?;
        let foot = builder.declare_enum(RouteNetwork::FOOT_KEY, false)?;
        Ok(Self {
            registry: builder.seal(),
            bike,
            mtb,
            foot,
        })
    }

    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    /// Empty flags; every network is missing.
    pub fn create_flags(&self) -> RelationFlags {
        self.registry.create_record()
    }

    /// Merges the contribution of `relation` into `flags`.
    ///
    /// The merge is order independent, so relations can be handled in any order.
    pub fn handle(&self, relation: &ReaderRelation, flags: &mut RelationFlags) {
        let merged = merge_networks(self.networks(flags), relation_networks(relation));
        self.store(flags, merged);
    }

    pub fn networks(&self, flags: &RelationFlags) -> RouteNetworks {
        RouteNetworks {
            bike: self.bike.get(Direction::Forward, flags),
            mtb: self.mtb.get(Direction::Forward, flags),
            foot: self.foot.get(Direction::Forward, flags),
        }
    }

    fn store(&self, flags: &mut RelationFlags, networks: RouteNetworks) {
        self.bike.set(Direction::Forward, flags, networks.bike);
        self.mtb.set(Direction::Forward, flags, networks.mtb);
        self.foot.set(Direction::Forward, flags, networks.foot);
    }

    /// Folds all relations into flags per member way, in parallel.
    pub fn aggregate(&self, relations: &[ReaderRelation]) -> HashMap<u64, RelationFlags> {
        relations
            .par_iter()
            .fold(HashMap::new, |mut ways: HashMap<u64, RouteNetworks>, relation| {
                let networks = relation_networks(relation);
                if networks != RouteNetworks::default() {
                    for way in relation.way_members() {
                        let entry = ways.entry(way).or_default();
                        *entry = merge_networks(*entry, networks);
                    }
                }
                ways
            })
            .reduce(HashMap::new, |mut a, b| {
                for (way, networks) in b {
                    let entry = a.entry(way).or_default();
                    *entry = merge_networks(*entry, networks);
                }
                a
            })
            .into_iter()
            .map(|(way, networks)| {
                let mut flags = self.create_flags();
                self.store(&mut flags, networks);
                (way, flags)
            })
            .collect()
    }
}
