//! Runs the generic and per-mode classifiers over a batch of map elements.

use crate::TagParseError;
use crate::area::{AreaLookup, BuiltinLegalSpeeds, LegalSpeeds, TagAreaLookup};
use crate::classifier::{ClassifierContext, ModeClassifier, RouteNetworks};
use crate::config::{EncodingConfig, ModeSettings};
use crate::generic::GenericProperties;
use crate::modes::classifier;
use crate::osm::{OsmBatch, ReaderNode, ReaderRelation, ReaderWay};
use crate::relation::RelationPass;
use crate::turn_restriction::{TurnGraph, TurnRestriction};
use enumset::EnumSet;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tagflags_conditional::{
    AccessState, ConditionalEntry, ConditionalStore, HolidayCalendar, NoHolidays,
};
use tagflags_encoding::{
    EdgeRecord, Mode, PropertyRegistry, RegistryBuilder, RelationFlags, TurnCostCodec,
    TurnCostCodecBuilder, TurnCostTable,
};
use tracing::{debug, info, warn};

/// Collects the configuration and collaborators of [`OsmParsers`].
pub struct OsmParsersBuilder {
    config: EncodingConfig,
    area: Arc<dyn AreaLookup>,
    legal: Arc<dyn LegalSpeeds>,
    calendar: Arc<dyn HolidayCalendar>,
}

impl OsmParsersBuilder {
    pub fn new(config: EncodingConfig) -> Self {
        Self {
            config,
            area: Arc::new(TagAreaLookup),
            legal: Arc::new(BuiltinLegalSpeeds),
            calendar: Arc::new(NoHolidays),
        }
    }

    #[must_use]
    pub fn with_area_lookup(mut self, area: Arc<dyn AreaLookup>) -> Self {
        self.area = area;
        self
    }

    #[must_use]
    pub fn with_legal_speeds(mut self, legal: Arc<dyn LegalSpeeds>) -> Self {
        self.legal = legal;
        self
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    /// Declares every property and seals the record layout.
    ///
    /// # Errors
    ///
    /// Fails if a mode is configured twice, a mode option is invalid,
    /// or the layout cannot be declared.
    pub fn build(self) -> Result<OsmParsers, TagParseError> {
        let context = ClassifierContext::new(self.config.reference_time_or_now())
            .with_calendar(Arc::clone(&self.calendar));
        let mut builder = RegistryBuilder::new();
        let generic = GenericProperties::declare(&mut builder)?;
        let mut turn_costs = TurnCostCodecBuilder::new();
        let mut modes = EnumSet::<Mode>::new();
        let mut classifiers = Vec::with_capacity(self.config.modes.len());
        for mode_config in &self.config.modes {
            let settings = ModeSettings::resolve(mode_config)?;
            if !modes.insert(settings.mode) {
                return Err(TagParseError::InvalidConfig {
                    reason: format!("mode {} is configured more than once", settings.mode),
                });
            }
            classifiers.push(classifier(&mut builder, &settings, &context)?);
            if let Some(max_turn_costs) = settings.max_turn_costs {
                let width = turn_costs.declare(settings.mode, max_turn_costs)?;
                debug!(mode = %settings.mode, width, "Declared turn costs");
            }
        }
        let registry = builder.seal();
        info!(
            modes = classifiers.len(),
            bits = registry.bits_used(),
            words = registry.size_words(),
            "Sealed edge record layout"
        );
        Ok(OsmParsers {
            registry,
            generic,
            classifiers,
            relations: RelationPass::new()?,
            turn_costs: turn_costs.build(),
            conditionals: ConditionalStore::new(),
            area: self.area,
            legal: self.legal,
            calendar: self.calendar,
            failed_ways: AtomicU64::new(0),
            conditional_ways: AtomicU64::new(0),
        })
    }
}

/// The result of classifying one [`OsmBatch`].
#[derive(Debug)]
pub struct ClassifiedBatch {
    /// One record per way, in input order; the index is the edge id.
    pub records: Vec<EdgeRecord>,
    /// The modes each barrier node blocks.
    pub barriers: HashMap<u64, EnumSet<Mode>>,
    pub turn_costs: TurnCostTable,
}

/// Compiles map elements into edge records for every configured mode.
///
/// Built once and shared by reference; classification only reads the layout.
pub struct OsmParsers {
    registry: PropertyRegistry,
    generic: GenericProperties,
    classifiers: Vec<Box<dyn ModeClassifier>>,
    relations: RelationPass,
    turn_costs: TurnCostCodec,
    conditionals: ConditionalStore,
    area: Arc<dyn AreaLookup>,
    legal: Arc<dyn LegalSpeeds>,
    calendar: Arc<dyn HolidayCalendar>,
    failed_ways: AtomicU64,
    conditional_ways: AtomicU64,
}

impl OsmParsers {
    pub fn builder(config: EncodingConfig) -> OsmParsersBuilder {
        OsmParsersBuilder::new(config)
    }

    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    pub fn generic(&self) -> &GenericProperties {
        &self.generic
    }

    pub fn relation_pass(&self) -> &RelationPass {
        &self.relations
    }

    pub fn turn_cost_codec(&self) -> &TurnCostCodec {
        &self.turn_costs
    }

    /// Time-dependent restrictions found so far, keyed by edge id.
    pub fn conditionals(&self) -> &ConditionalStore {
        &self.conditionals
    }

    pub fn calendar(&self) -> &dyn HolidayCalendar {
        self.calendar.as_ref()
    }

    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        self.classifiers.iter().map(|c| c.mode())
    }

    pub fn classifier(&self, mode: Mode) -> Option<&dyn ModeClassifier> {
        self.classifiers
            .iter()
            .find(|c| c.mode() == mode)
            .map(|c| &**c)
    }

    /// Ways for which at least one mode fell back to its defaults.
    pub fn failed_ways(&self) -> u64 {
        self.failed_ways.load(Ordering::Relaxed)
    }

    /// Ways with at least one time-dependent restriction.
    pub fn conditional_ways(&self) -> u64 {
        self.conditional_ways.load(Ordering::Relaxed)
    }

    pub fn create_edge_record(&self) -> EdgeRecord {
        self.registry.create_record()
    }

    /// Folds route relations into relation flags per member way.
    pub fn handle_relations(&self, relations: &[ReaderRelation]) -> HashMap<u64, RelationFlags> {
        self.relations.aggregate(relations)
    }

    /// Classifies one way into `record`.
    ///
    /// A mode whose rules fail (e.g. on a malformed number) is reset to its defaults,
    /// which means no access; the other modes are not affected.
    pub fn handle_way_tags(
        &self,
        edge_id: u32,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        flags: Option<&RelationFlags>,
    ) {
        let networks = flags.map_or_else(RouteNetworks::default, |f| self.relations.networks(f));
        self.generic.handle_way_tags(
            record,
            way,
            &networks,
            self.area.lookup(way),
            self.legal.as_ref(),
        );
        let mut failed = false;
        let mut conditional = false;
        for classifier in &self.classifiers {
            match classifier.handle_way_tags(record, way, &networks) {
                Ok(verdict) if verdict.conditional => {
                    conditional |= self.store_conditionals(edge_id, way, classifier.as_ref());
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(way = way.id, mode = %classifier.mode(), %error, "Falling back to defaults");
                    self.registry
                        .reset_namespace(record, &classifier.mode().namespace());
                    failed = true;
                }
            }
        }
        if failed {
            self.failed_ways.fetch_add(1, Ordering::Relaxed);
        }
        if conditional {
            self.conditional_ways.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Keeps the timed clauses of a way for later queries.
    fn store_conditionals(
        &self,
        edge_id: u32,
        way: &ReaderWay,
        classifier: &dyn ModeClassifier,
    ) -> bool {
        let inspector = classifier.inspector();
        let restrictions = inspector.timed_restrictions(&way.tags);
        if restrictions.is_empty() {
            return false;
        }
        // the access of the way without its conditional tags
        let mut unconditional = way.clone();
        for key in inspector.keys() {
            unconditional.tags.remove(key);
        }
        let default = if classifier.access(&unconditional).can_skip() {
            AccessState::Closed
        } else {
            AccessState::Open
        };
        for restriction in restrictions {
            self.conditionals.insert(ConditionalEntry::new(
                edge_id,
                restriction.restriction_type,
                EnumSet::only(classifier.mode()),
                Some(default),
                restriction.expression,
                restriction.raw,
            ));
        }
        true
    }

    /// Classifies all ways in parallel; the position of a way is its edge id.
    ///
    /// # Errors
    ///
    /// Fails if there are more ways than edge ids.
    pub fn handle_ways(
        &self,
        ways: &[ReaderWay],
        relation_flags: &HashMap<u64, RelationFlags>,
    ) -> Result<Vec<EdgeRecord>, TagParseError> {
        let count = u32::try_from(ways.len()).map_err(|_| TagParseError::InvalidConfig {
            reason: format!("{} ways exceed the edge id range", ways.len()),
        })?;
        Ok((0..count)
            .into_par_iter()
            .zip(ways)
            .map(|(edge_id, way)| {
                let mut record = self.create_edge_record();
                self.handle_way_tags(edge_id, &mut record, way, relation_flags.get(&way.id));
                record
            })
            .collect())
    }

    /// The modes for which `node` is a barrier.
    pub fn handle_node_tags(&self, node: &ReaderNode) -> EnumSet<Mode> {
        self.classifiers
            .iter()
            .filter(|c| c.is_barrier(node))
            .map(|c| c.mode())
            .collect()
    }

    /// Writes the turn records of all restriction relations.
    ///
    /// # Errors
    ///
    /// Fails if the turn cost codec rejects a mode.
    pub fn handle_turn_relations(
        &self,
        relations: &[ReaderRelation],
        graph: &dyn TurnGraph,
    ) -> Result<TurnCostTable, TagParseError> {
        let mut table = TurnCostTable::new();
        let modes: EnumSet<Mode> = self.turn_costs.modes().collect();
        if modes.is_empty() {
            return Ok(table);
        }
        for relation in relations {
            for restriction in TurnRestriction::parse(relation, modes) {
                restriction.apply(graph, &self.turn_costs, &mut table)?;
            }
        }
        Ok(table)
    }

    /// Runs the relation pass, then the way pass, then nodes and turn relations.
    ///
    /// # Errors
    ///
    /// See [`OsmParsers::handle_ways`] and [`OsmParsers::handle_turn_relations`].
    pub fn process(&self, batch: &OsmBatch, graph: &dyn TurnGraph) -> Result<ClassifiedBatch, TagParseError> {
        let relation_flags = self.handle_relations(&batch.relations);
        let records = self.handle_ways(&batch.ways, &relation_flags)?;
        let barriers: HashMap<u64, EnumSet<Mode>> = batch
            .nodes
            .iter()
            .map(|node| (node.id, self.handle_node_tags(node)))
            .filter(|(_, modes)| !modes.is_empty())
            .collect();
        let turn_costs = self.handle_turn_relations(&batch.relations, graph)?;
        let (parsed, skipped) = self.classifiers.iter().fold((0, 0), |(p, s), c| {
            let inspector = c.inspector();
            (p + inspector.parsed_conditions(), s + inspector.skipped_conditions())
        });
        info!(
            ways = records.len(),
            failed = self.failed_ways(),
            conditional = self.conditional_ways(),
            parsed_conditions = parsed,
            skipped_conditions = skipped,
            barriers = barriers.len(),
            turn_records = turn_costs.len(),
            "Classified batch"
        );
        Ok(ClassifiedBatch {
            records,
            barriers,
            turn_costs,
        })
    }
}

impl std::fmt::Debug for OsmParsers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsmParsers")
            .field("registry", &self.registry)
            .field("modes", &self.modes().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::OsmParsers;
    use crate::TagParseError;
    use crate::config::EncodingConfig;
    use crate::osm::{MemberType, OsmBatch, ReaderNode, ReaderRelation, ReaderWay};
    use crate::turn_restriction::WayGraph;
    use chrono::{NaiveDate, NaiveDateTime};
    use enumset::EnumSet;
    use std::collections::HashMap;
    use tagflags_conditional::AccessState;
    use tagflags_encoding::values::RouteNetwork;
    use tagflags_encoding::{Direction, Mode};

    /// Wednesday, 6 January 2021.
    fn wednesday(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 6)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid time")
    }

    fn parsers(modes: &str) -> OsmParsers {
        let config = EncodingConfig::from_modes(modes)
            .expect("valid modes")
            .with_reference_time(wednesday(12));
        OsmParsers::builder(config).build().expect("builds")
    }

    #[test]
    fn layout_holds_generic_and_mode_properties() {
        let parsers = parsers("car, bike");
        let registry = parsers.registry();
        for name in ["road_class", "max_speed", "car.access", "car.average_speed", "bike.priority"] {
            assert!(registry.contains(name), "{name}");
        }
        assert_eq!(parsers.modes().collect::<Vec<_>>(), vec![Mode::Car, Mode::Bike]);
        assert!(parsers.classifier(Mode::Foot).is_none());
    }

    #[test]
    fn generic_properties_come_first() {
        let parsers = parsers("car, foot");
        let names: Vec<&str> = parsers
            .registry()
            .descriptors()
            .iter()
            .map(|d| d.name())
            .collect();
        if !cfg!(miri) {
            insta::assert_debug_snapshot!("car_foot_layout", names);
        }
    }

    #[test]
    fn modes_are_configured_once() {
        let config = EncodingConfig::from_modes("car, bike, car|speed_bits=7").expect("valid modes");
        assert!(matches!(
            OsmParsers::builder(config).build(),
            Err(TagParseError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn failing_modes_fall_back_to_defaults() {
        let parsers = parsers("car, bike");
        let way = ReaderWay::new(1)
            .with_tag("highway", "residential")
            .with_tag("class:bicycle", "lots");
        let records = parsers
            .handle_ways(&[way], &HashMap::new())
            .expect("classifies");
        let registry = parsers.registry();
        let car = registry.boolean("car.access").expect("declared");
        let bike = registry.boolean("bike.access").expect("declared");
        let bike_speed = registry.decimal("bike.average_speed").expect("declared");
        for direction in Direction::BOTH {
            assert!(car.get(direction, &records[0]));
            assert!(!bike.get(direction, &records[0]));
            assert_eq!(bike_speed.get(direction, &records[0]), 0.0);
        }
        assert_eq!(parsers.failed_ways(), 1);
    }

    #[test]
    fn timed_restrictions_are_kept_per_edge() {
        let parsers = parsers("car");
        let rush_hour = ReaderWay::new(1)
            .with_tag("highway", "primary")
            .with_tag("access:conditional", "no @ (Mo-Fr 07:00-09:00)");
        let opened = ReaderWay::new(2)
            .with_tag("highway", "primary")
            .with_tag("access", "no")
            .with_tag("access:conditional", "yes @ (Mo-Fr 14:00-16:00)");
        let records = parsers
            .handle_ways(&[rush_hour, opened], &HashMap::new())
            .expect("classifies");

        // clauses with a time of day leave the static verdict alone
        let access = parsers.registry().boolean("car.access").expect("declared");
        assert!(access.get(Direction::Forward, &records[0]));
        assert!(!access.get(Direction::Forward, &records[1]));

        let store = parsers.conditionals();
        let calendar = parsers.calendar();
        assert_eq!(store.len(), 2);
        assert_eq!(store.access_at(0, Mode::Car, wednesday(8), calendar), Some(AccessState::Closed));
        assert_eq!(store.access_at(0, Mode::Car, wednesday(10), calendar), Some(AccessState::Open));
        assert_eq!(store.access_at(1, Mode::Car, wednesday(15), calendar), Some(AccessState::Open));
        assert_eq!(store.access_at(1, Mode::Car, wednesday(13), calendar), Some(AccessState::Closed));
        assert_eq!(store.access_at(1, Mode::Bike, wednesday(15), calendar), None);
        assert_eq!(parsers.conditional_ways(), 2);
    }

    #[test]
    fn relation_tie_break_is_order_independent() {
        let parsers = parsers("bike");
        let route = |id, network| {
            ReaderRelation::new(id)
                .with_tag("type", "route")
                .with_tag("route", "bicycle")
                .with_tag("network", network)
                .with_member(MemberType::Way, 1, "")
        };
        let way = ReaderWay::new(1).with_tag("highway", "secondary");
        let network = parsers.generic().bike_network.clone();
        for relations in [
            vec![route(10, "rcn"), route(11, "icn")],
            vec![route(11, "icn"), route(10, "rcn")],
        ] {
            let flags = parsers.handle_relations(&relations);
            let records = parsers
                .handle_ways(std::slice::from_ref(&way), &flags)
                .expect("classifies");
            assert_eq!(
                network.get(Direction::Forward, &records[0]),
                RouteNetwork::International
            );
        }
    }

    #[test]
    fn batches_with_barriers_and_turn_restrictions() {
        let parsers = parsers("car|turn_costs=true, foot");
        let way = |id, nodes: &[u64]| {
            let mut way = ReaderWay::new(id).with_tag("highway", "residential");
            way.nodes = nodes.to_vec();
            way
        };
        let batch = OsmBatch {
            nodes: vec![
                ReaderNode::new(5).with_tag("barrier", "bollard"),
                ReaderNode::new(6).with_tag("barrier", "fence"),
                ReaderNode::new(7).with_tag("highway", "crossing"),
            ],
            ways: vec![way(1, &[5, 100]), way(2, &[100, 6])],
            relations: vec![
                ReaderRelation::new(20)
                    .with_tag("type", "restriction")
                    .with_tag("restriction", "no_right_turn")
                    .with_member(MemberType::Way, 1, "from")
                    .with_member(MemberType::Node, 100, "via")
                    .with_member(MemberType::Way, 2, "to"),
            ],
        };
        let graph = WayGraph::new(&batch.ways);
        let classified = parsers.process(&batch, &graph).expect("classifies");

        assert_eq!(classified.records.len(), 2);
        assert_eq!(classified.barriers.len(), 2);
        assert_eq!(classified.barriers[&5], EnumSet::only(Mode::Car));
        assert_eq!(classified.barriers[&6], Mode::Car | Mode::Foot);
        assert_eq!(classified.turn_costs.len(), 1);
        let (_, record) = classified.turn_costs.iter().next().expect("one turn");
        assert_eq!(parsers.turn_cost_codec().is_restricted(record, Mode::Car), Ok(true));
    }
}
