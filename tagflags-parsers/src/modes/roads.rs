use crate::TagParseError;
use crate::access::{AccessRules, AccessVerdict, Oneway};
use crate::classifier::{ClassifierContext, ModeClassifier, ModeProperties, RouteNetworks};
use crate::config::ModeSettings;
use crate::osm::{ReaderNode, ReaderWay, Tagged};
use tagflags_conditional::ConditionalTagInspector;
use tagflags_encoding::{EdgeRecord, Mode, RegistryBuilder};

/// Every highway, both ways, as fast as the field allows.
///
/// Useful to build a graph that keeps all roads regardless of who may use them.
#[derive(Debug)]
pub struct RoadsClassifier {
    properties: ModeProperties,
    inspector: ConditionalTagInspector,
}

impl RoadsClassifier {
    /// Declares the roads properties; there is no priority.
    ///
    /// # Errors
    ///
    /// Fails if the properties cannot be declared.
    pub fn new(
        builder: &mut RegistryBuilder,
        settings: &ModeSettings,
        context: &ClassifierContext,
    ) -> Result<Self, TagParseError> {
        let rules = AccessRules::new(&[], &[], &[], settings.block_private, false);
        Ok(Self {
            inspector: context.inspector(&rules),
            properties: ModeProperties::declare(builder, settings, false)?,
        })
    }

    pub fn properties(&self) -> &ModeProperties {
        &self.properties
    }
}

impl ModeClassifier for RoadsClassifier {
    fn mode(&self) -> Mode {
        Mode::Roads
    }

    fn access(&self, way: &ReaderWay) -> AccessVerdict {
        if way.tag("highway").is_some() {
            AccessVerdict::WAY
        } else {
            AccessVerdict::SKIP
        }
    }

    fn handle_way_tags(
        &self,
        record: &mut EdgeRecord,
        way: &ReaderWay,
        _networks: &RouteNetworks,
    ) -> Result<AccessVerdict, TagParseError> {
        let verdict = self.access(way);
        if !verdict.can_skip() {
            let speed = self.properties.max_speed;
            self.properties.apply(record, Oneway::Both, [speed, speed]);
        }
        Ok(verdict)
    }

    fn is_barrier(&self, _node: &ReaderNode) -> bool {
        false
    }

    fn inspector(&self) -> &ConditionalTagInspector {
        &self.inspector
    }
}

#[cfg(test)]
mod tests {
    use super::RoadsClassifier;
    use crate::access::AccessVerdict;
    use crate::classifier::{ModeClassifier, RouteNetworks};
    use crate::config::{ModeConfig, ModeSettings};
    use crate::modes::test_context;
    use crate::osm::{ReaderNode, ReaderWay};
    use tagflags_encoding::{Direction, Mode, RegistryBuilder};

    #[test]
    fn every_highway_is_open() {
        let settings =
            ModeSettings::resolve(&ModeConfig::new(Mode::Roads)).expect("valid settings");
        let mut builder = RegistryBuilder::new();
        let roads =
            RoadsClassifier::new(&mut builder, &settings, &test_context()).expect("declares");
        let registry = builder.seal();

        let way = ReaderWay::new(1)
            .with_tag("highway", "footway")
            .with_tag("access", "no")
            .with_tag("oneway", "yes");
        let mut record = registry.create_record();
        let verdict = roads
            .handle_way_tags(&mut record, &way, &RouteNetworks::default())
            .expect("classifies");
        assert_eq!(verdict, AccessVerdict::WAY);
        for direction in Direction::BOTH {
            assert!(roads.properties().has_access(direction, &record));
            assert_eq!(roads.properties().speed(direction, &record), 254.0);
        }
        assert!(roads.properties().priority(&record).is_none());

        assert_eq!(
            roads.access(&ReaderWay::new(2).with_tag("route", "ferry")),
            AccessVerdict::SKIP
        );
        assert!(!roads.is_barrier(&ReaderNode::new(1).with_tag("barrier", "fence")));
    }
}
