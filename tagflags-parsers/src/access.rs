use crate::osm::{ReaderNode, ReaderWay, Tagged, split_values};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tagflags_conditional::{ConditionalTagInspector, ValuePolicy};
use tagflags_encoding::Direction;

/// How a mode may use a way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WayAccess {
    Skip,
    Way,
    Ferry,
}

/// The static access of a way for one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessVerdict {
    pub access: WayAccess,
    /// Access also depends on conditional tags, which are kept for time-dependent queries.
    pub conditional: bool,
}

impl AccessVerdict {
    pub const SKIP: Self = Self {
        access: WayAccess::Skip,
        conditional: false,
    };

    pub const WAY: Self = Self {
        access: WayAccess::Way,
        conditional: false,
    };

    pub const FERRY: Self = Self {
        access: WayAccess::Ferry,
        conditional: false,
    };

    #[must_use]
    pub fn with_conditional(mut self, conditional: bool) -> Self {
        self.conditional = conditional;
        self
    }

    #[inline]
    pub fn can_skip(&self) -> bool {
        self.access == WayAccess::Skip
    }

    #[inline]
    pub fn is_ferry(&self) -> bool {
        self.access == WayAccess::Ferry
    }
}

/// The directions in which a way may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Oneway {
    Both,
    Forward,
    Backward,
}

impl Oneway {
    pub fn allows(self, direction: Direction) -> bool {
        match self {
            Oneway::Both => true,
            Oneway::Forward => direction == Direction::Forward,
            Oneway::Backward => direction == Direction::Backward,
        }
    }
}

pub const ONEWAY_VALUES: &[&str] = &["yes", "true", "1", "-1"];
pub const FERRY_ROUTES: &[&str] = &["ferry", "shuttle_train"];

/// The tag vocabulary a mode uses to decide access.
#[derive(Debug, Clone)]
pub struct AccessRules {
    /// Restriction keys from the most to the least specific (`motorcar`, …, `access`).
    pub restrictions: Vec<&'static str>,
    pub restricted_values: HashSet<&'static str>,
    pub intended_values: HashSet<&'static str>,
    /// Barriers that block unless the mode is explicitly permitted.
    pub absolute_barriers: HashSet<&'static str>,
    /// Barriers that only block when access is restricted as well.
    pub potential_barriers: HashSet<&'static str>,
    pub block_fords: bool,
}

impl AccessRules {
    /// `block_private=false` drops `private` (and `delivery`) from the restricted values.
    pub fn new(
        restrictions: &[&'static str],
        restricted_values: &[&'static str],
        intended_values: &[&'static str],
        block_private: bool,
        block_fords: bool,
    ) -> Self {
        let mut restricted_values: HashSet<_> = restricted_values.iter().copied().collect();
        if !block_private {
            restricted_values.remove("private");
            restricted_values.remove("delivery");
        }
        Self {
            restrictions: restrictions.to_vec(),
            restricted_values,
            intended_values: intended_values.iter().copied().collect(),
            absolute_barriers: HashSet::new(),
            potential_barriers: HashSet::new(),
            block_fords,
        }
    }

    #[must_use]
    pub fn with_barriers(
        mut self,
        absolute: &[&'static str],
        potential: &[&'static str],
    ) -> Self {
        self.absolute_barriers = absolute.iter().copied().collect();
        self.potential_barriers = potential.iter().copied().collect();
        self
    }

    /// The conditional keys of this mode (`<key>:conditional` for every restriction key).
    pub fn conditional_keys(&self) -> Vec<String> {
        self.restrictions
            .iter()
            .map(|key| format!("{key}:conditional"))
            .collect()
    }

    pub fn value_policy(&self) -> ValuePolicy {
        ValuePolicy::new(
            self.restricted_values.iter().copied(),
            self.intended_values.iter().copied(),
        )
    }

    pub fn inspector(&self, reference_time: NaiveDateTime) -> ConditionalTagInspector {
        ConditionalTagInspector::new(
            self.conditional_keys(),
            self.value_policy(),
            reference_time,
        )
    }

    /// The `;`-split values of the most specific restriction key present.
    pub fn first_values<'t, T: Tagged>(&self, element: &'t T) -> Vec<&'t str> {
        element
            .first_priority_tag(&self.restrictions)
            .map(split_values)
            .unwrap_or_default()
    }

    pub fn is_restricted<T: Tagged>(&self, element: &T) -> bool {
        self.first_values(element)
            .iter()
            .any(|v| self.restricted_values.contains(*v))
    }

    pub fn is_intended<T: Tagged>(&self, element: &T) -> bool {
        self.first_values(element)
            .iter()
            .any(|v| self.intended_values.contains(*v))
    }

    /// Whether `key` is restricted for this mode (e.g. `vehicle:forward=no`).
    pub fn restricts(&self, way: &ReaderWay, key: &str) -> bool {
        way.tag_values(key)
            .iter()
            .any(|v| self.restricted_values.contains(*v))
    }

    pub fn is_ford(way: &ReaderWay) -> bool {
        way.has_tag("highway", "ford") || way.tag("ford").is_some_and(|v| v != "no")
    }

    /// Ferry access for a way carrying a `route` tag.
    ///
    /// A restricted ferry is skipped. Otherwise it is used when intended for this mode,
    /// or when nothing is tagged and the ferry is not a foot or bicycle only one.
    pub fn ferry(&self, way: &ReaderWay) -> Option<AccessVerdict> {
        if !way.has_tag_in("route", FERRY_ROUTES) {
            return None;
        }
        let values = self.first_values(way);
        if values.iter().any(|v| self.restricted_values.contains(*v)) {
            Some(AccessVerdict::SKIP)
        } else if values.iter().any(|v| self.intended_values.contains(*v))
            || (values.is_empty() && way.tag("foot").is_none() && way.tag("bicycle").is_none())
        {
            Some(AccessVerdict::FERRY)
        } else {
            Some(AccessVerdict::SKIP)
        }
    }

    /// Access for a way whose highway class the mode accepts: restriction tags, fords
    /// and conditional tags, in that order.
    ///
    /// Only conditions without a time of day change the verdict at `inspector`'s reference time;
    /// every parsed condition marks the verdict as conditional.
    pub fn way_access(
        &self,
        way: &ReaderWay,
        inspector: &ConditionalTagInspector,
    ) -> AccessVerdict {
        let conditional = inspector.has_conditional(&way.tags);
        let values = self.first_values(way);
        if values.iter().any(|v| self.restricted_values.contains(*v)) {
            return if conditional && inspector.restricted_way_conditionally_permitted(&way.tags) {
                AccessVerdict::WAY
            } else {
                AccessVerdict::SKIP
            }
            .with_conditional(conditional);
        }
        if values.iter().any(|v| self.intended_values.contains(*v)) {
            return AccessVerdict::WAY.with_conditional(conditional);
        }
        if self.block_fords && Self::is_ford(way) {
            return AccessVerdict::SKIP.with_conditional(conditional);
        }
        if conditional && inspector.permitted_way_conditionally_restricted(&way.tags) {
            AccessVerdict::SKIP.with_conditional(true)
        } else {
            AccessVerdict::WAY.with_conditional(conditional)
        }
    }

    /// Whether a node blocks this mode.
    pub fn is_barrier(&self, node: &ReaderNode) -> bool {
        let locked = node.has_tag("locked", "yes");
        if let Some(barrier) = node.tag("barrier") {
            if self.absolute_barriers.contains(barrier) {
                return locked || !self.is_intended(node);
            }
            if self.potential_barriers.contains(barrier) {
                return locked || self.is_restricted(node);
            }
        }
        let ford = node.has_tag("ford", "yes") || node.has_tag("highway", "ford");
        if ford {
            return self.is_restricted(node) || (self.block_fords && !self.is_intended(node));
        }
        false
    }
}

/// Oneway handling shared by the motorized modes.
///
/// `oneway=-1` reverses the direction; roundabouts are oneway.
/// Restricted `<key>:forward` / `<key>:backward` values close one direction.
pub fn vehicle_oneway(way: &ReaderWay, rules: &AccessRules, keys: &[&str]) -> Oneway {
    let roundabout = way.has_tag_in("junction", &["roundabout", "circular"]);
    let forward_closed = keys
        .iter()
        .any(|key| rules.restricts(way, &format!("{key}:forward")));
    let backward_closed = keys
        .iter()
        .any(|key| rules.restricts(way, &format!("{key}:backward")));
    if way.has_tag_in("oneway", ONEWAY_VALUES) || roundabout {
        if way.has_tag("oneway", "-1") {
            Oneway::Backward
        } else {
            Oneway::Forward
        }
    } else if forward_closed && !backward_closed {
        Oneway::Backward
    } else if backward_closed && !forward_closed {
        Oneway::Forward
    } else {
        Oneway::Both
    }
}
