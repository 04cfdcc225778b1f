//! Turn restriction relations and the turn records they produce.

use crate::TagParseError;
use crate::osm::{MemberType, ReaderRelation, ReaderWay, Tagged};
use enumset::EnumSet;
use std::collections::HashMap;
use tagflags_encoding::{Mode, TurnCostCodec, TurnCostTable, TurnKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestrictionKind {
    /// `no_left_turn`, `no_u_turn`, …: the one turn is forbidden.
    No,
    /// `only_straight_on`, …: every other turn at the via node is forbidden.
    Only,
}

impl RestrictionKind {
    fn parse(value: &str) -> Option<Self> {
        if value.starts_with("no_") {
            Some(RestrictionKind::No)
        } else if value.starts_with("only_") {
            Some(RestrictionKind::Only)
        } else {
            None
        }
    }
}

/// The `restriction:<suffix>` and `except` values that concern a mode, most specific first.
fn vehicle_types(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::Car => &["motorcar", "motor_vehicle", "vehicle"],
        Mode::Motorcycle => &["motorcycle", "motor_vehicle", "vehicle"],
        Mode::Bus => &["bus", "psv", "motor_vehicle", "vehicle"],
        Mode::Bike | Mode::RacingBike | Mode::MountainBike => &["bicycle", "vehicle"],
        Mode::Foot | Mode::Hiking | Mode::Wheelchair => &["foot"],
        Mode::Roads => &[],
    }
}

/// Whether the plain `restriction` tag applies to a mode.
fn follows_plain_restriction(mode: Mode) -> bool {
    !matches!(
        mode,
        Mode::Foot | Mode::Hiking | Mode::Wheelchair | Mode::Roads
    )
}

/// A parsed `type=restriction` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRestriction {
    pub relation_id: u64,
    pub from_way: u64,
    pub via_node: u64,
    pub to_way: u64,
    pub kind: RestrictionKind,
    pub modes: EnumSet<Mode>,
}

impl TurnRestriction {
    /// Parses a restriction relation for the given modes.
    ///
    /// Returns one restriction per distinct kind, since `restriction:bus=only_*` may
    /// accompany a plain `restriction=no_*`. Relations with a via way, missing members or
    /// unknown values yield nothing.
    pub fn parse(relation: &ReaderRelation, modes: EnumSet<Mode>) -> Vec<Self> {
        if !relation.has_tag("type", "restriction") {
            return Vec::new();
        }
        let (Some(from_way), Some(via_node), Some(to_way)) = (
            relation.member(MemberType::Way, "from"),
            relation.member(MemberType::Node, "via"),
            relation.member(MemberType::Way, "to"),
        ) else {
            return Vec::new();
        };
        let except = relation.tag_values("except");

        let mut by_kind: HashMap<RestrictionKind, EnumSet<Mode>> = HashMap::new();
        for mode in modes {
            let types = vehicle_types(mode);
            if types.iter().any(|t| except.contains(t)) {
                continue;
            }
            let value = types
                .iter()
                .find_map(|t| relation.tag(&format!("restriction:{t}")))
                .or_else(|| {
                    relation
                        .tag("restriction")
                        .filter(|_| follows_plain_restriction(mode))
                });
            if let Some(kind) = value.and_then(RestrictionKind::parse) {
                by_kind.entry(kind).or_default().insert(mode);
            }
        }
        let mut restrictions: Vec<_> = by_kind
            .into_iter()
            .map(|(kind, modes)| Self {
                relation_id: relation.id,
                from_way,
                via_node,
                to_way,
                kind,
                modes,
            })
            .collect();
        restrictions.sort_by_key(|r| r.kind == RestrictionKind::Only);
        restrictions
    }

    /// Writes the restricted turns for every affected mode that has turn costs.
    ///
    /// Returns the number of turn records written.
    ///
    /// # Errors
    ///
    /// Fails if the codec rejects a mode.
    pub fn apply(
        &self,
        graph: &dyn TurnGraph,
        codec: &TurnCostCodec,
        table: &mut TurnCostTable,
    ) -> Result<usize, TagParseError> {
        let (Some(from_edge), Some(to_edge)) = (
            graph.edge(self.from_way, self.via_node),
            graph.edge(self.to_way, self.via_node),
        ) else {
            return Ok(0);
        };
        let targets: Vec<u32> = match self.kind {
            RestrictionKind::No => vec![to_edge],
            RestrictionKind::Only => graph
                .edges_at(self.via_node)
                .into_iter()
                .filter(|edge| *edge != to_edge)
                .collect(),
        };
        let modes: Vec<Mode> = codec.modes().filter(|m| self.modes.contains(*m)).collect();
        let mut written = 0;
        for target in targets {
            let key = TurnKey {
                via_node: self.via_node,
                from_edge,
                to_edge: target,
            };
            for mode in &modes {
                table.add(codec, key, *mode, 0.0, true)?;
                written += 1;
            }
        }
        Ok(written)
    }
}

/// The part of graph storage that turn restrictions need.
pub trait TurnGraph {
    /// The edge of `way` that touches `node`.
    fn edge(&self, way: u64, node: u64) -> Option<u32>;

    /// All edges touching `node`.
    fn edges_at(&self, node: u64) -> Vec<u32>;
}

/// One edge per way, numbered in input order.
///
/// Enough for inspecting small extracts; real graphs split ways at junctions.
#[derive(Debug, Default)]
pub struct WayGraph {
    edges: HashMap<u64, u32>,
    nodes: HashMap<u64, Vec<u32>>,
}

impl WayGraph {
    pub fn new(ways: &[ReaderWay]) -> Self {
        let mut graph = Self::default();
        for (edge, way) in (0u32..).zip(ways) {
            graph.edges.insert(way.id, edge);
            for node in &way.nodes {
                let edges = graph.nodes.entry(*node).or_default();
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
        graph
    }
}

impl TurnGraph for WayGraph {
    fn edge(&self, way: u64, node: u64) -> Option<u32> {
        let edge = *self.edges.get(&way)?;
        self.nodes
            .get(&node)
            .is_some_and(|edges| edges.contains(&edge))
            .then_some(edge)
    }

    fn edges_at(&self, node: u64) -> Vec<u32> {
        self.nodes.get(&node).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{RestrictionKind, TurnGraph, TurnRestriction, WayGraph};
    use crate::osm::{MemberType, ReaderRelation, ReaderWay};
    use enumset::EnumSet;
    use tagflags_encoding::{Mode, TurnCostCodecBuilder, TurnCostTable, TurnKey};

    fn restriction(value: &str) -> ReaderRelation {
        ReaderRelation::new(9)
            .with_tag("type", "restriction")
            .with_tag("restriction", value)
            .with_member(MemberType::Way, 1, "from")
            .with_member(MemberType::Node, 100, "via")
            .with_member(MemberType::Way, 2, "to")
    }

    /// A crossing at node 100: ways 1 and 2 end there, way 3 passes through.
    fn crossing() -> WayGraph {
        let way = |id, nodes: &[u64]| {
            let mut way = ReaderWay::new(id);
            way.nodes = nodes.to_vec();
            way
        };
        WayGraph::new(&[way(1, &[10, 100]), way(2, &[100, 20]), way(3, &[30, 100, 40])])
    }

    #[test]
    fn parses_modes_and_exceptions() {
        let modes = Mode::Car | Mode::Bike | Mode::Foot | Mode::Bus;
        let parsed = TurnRestriction::parse(&restriction("no_left_turn"), modes);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind, RestrictionKind::No);
        assert_eq!(parsed[0].modes, Mode::Car | Mode::Bike | Mode::Bus);

        let relation = restriction("no_left_turn")
            .with_tag("except", "bicycle;psv")
            .with_tag("restriction:foot", "no_entry");
        let parsed = TurnRestriction::parse(&relation, modes);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].modes, Mode::Car | Mode::Foot);

        let relation = restriction("no_u_turn").with_tag("restriction:bus", "only_right_turn");
        let parsed = TurnRestriction::parse(&relation, modes);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].kind, RestrictionKind::Only);
        assert_eq!(parsed[1].modes, EnumSet::only(Mode::Bus));
    }

    #[test]
    fn ignores_incomplete_relations() {
        let modes = EnumSet::only(Mode::Car);
        assert!(TurnRestriction::parse(&restriction("give_way"), modes).is_empty());
        let via_way = ReaderRelation::new(1)
            .with_tag("type", "restriction")
            .with_tag("restriction", "no_left_turn")
            .with_member(MemberType::Way, 1, "from")
            .with_member(MemberType::Way, 5, "via")
            .with_member(MemberType::Way, 2, "to");
        assert!(TurnRestriction::parse(&via_way, modes).is_empty());
    }

    #[test]
    fn writes_turn_records() {
        let mut builder = TurnCostCodecBuilder::new();
        builder.declare(Mode::Car, 3).expect("declares");
        builder.declare(Mode::Bike, 3).expect("declares");
        let codec = builder.build();
        let graph = crossing();
        assert_eq!(graph.edge(1, 100), Some(0));
        assert_eq!(graph.edge(1, 20), None);

        let mut table = TurnCostTable::new();
        let no = TurnRestriction::parse(&restriction("no_left_turn"), Mode::Car | Mode::Foot);
        assert_eq!(no[0].apply(&graph, &codec, &mut table), Ok(1));
        let key = TurnKey {
            via_node: 100,
            from_edge: 0,
            to_edge: 1,
        };
        let record = table.get(&key).expect("restricted");
        assert_eq!(codec.is_restricted(record, Mode::Car), Ok(true));
        assert_eq!(codec.is_restricted(record, Mode::Bike), Ok(false));

        let mut table = TurnCostTable::new();
        let only = TurnRestriction::parse(&restriction("only_straight_on"), Mode::Bike.into());
        // every edge but the target: the u-turn and the crossing way
        assert_eq!(only[0].apply(&graph, &codec, &mut table), Ok(2));
        assert!(table.get(&key).is_none());
        assert_eq!(table.len(), 2);
    }
}
