use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read access to the tags of a map element.
pub trait Tagged {
    fn tags(&self) -> &HashMap<String, String>;

    #[inline]
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags().get(key).map(String::as_str)
    }

    #[inline]
    fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tag(key) == Some(value)
    }

    fn has_tag_in(&self, key: &str, values: &[&str]) -> bool {
        self.tag(key).is_some_and(|v| values.contains(&v))
    }

    /// Whether any of `keys` carries one of `values`.
    fn has_any_tag_in(&self, keys: &[&str], values: &[&str]) -> bool {
        keys.iter().any(|key| self.has_tag_in(key, values))
    }

    /// The value of the first present key, in priority order.
    fn first_priority_tag(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.tag(key))
    }

    /// The `;`-separated values of a tag, trimmed.
    fn tag_values(&self, key: &str) -> Vec<&str> {
        self.tag(key).map(split_values).unwrap_or_default()
    }
}

/// Splits a `;`-list (e.g. `no;delivery`) into trimmed, non-empty values.
pub fn split_values(value: &str) -> Vec<&str> {
    value
        .split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

/// A way as yielded by the map reader.
///
/// `coordinates` (longitude, latitude) and `elevations` are optional;
/// geometry-derived properties fall back to neutral values without them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderWay {
    pub id: u64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub nodes: Vec<u64>,
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    pub elevations: Vec<f64>,
}

impl ReaderWay {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Builder-style tag setter, mostly for tests and tooling.
    #[must_use]
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.set_tag(key, value);
        self
    }

    pub fn set_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.coordinates.iter().map(|[lon, lat]| Point::new(*lon, *lat))
    }

    /// Haversine lengths of the segments between consecutive coordinates, in meters.
    pub fn segment_lengths(&self) -> Vec<f64> {
        self.points()
            .zip(self.points().skip(1))
            .map(|(a, b)| Haversine.distance(a, b))
            .collect()
    }

    /// The length of the way in meters, if it has a geometry.
    pub fn length(&self) -> Option<f64> {
        (self.coordinates.len() >= 2).then(|| self.segment_lengths().iter().sum())
    }

    /// The straight-line distance between the end points, in meters.
    pub fn beeline(&self) -> Option<f64> {
        let first = self.points().next()?;
        let last = self.points().last()?;
        (self.coordinates.len() >= 2).then(|| Haversine.distance(first, last))
    }
}

impl Tagged for ReaderWay {
    fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderNode {
    pub id: u64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ReaderNode {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }
}

impl Tagged for ReaderNode {
    fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMember {
    #[serde(rename = "type")]
    pub member_type: MemberType,
    #[serde(rename = "ref")]
    pub reference: u64,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderRelation {
    pub id: u64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub members: Vec<RelationMember>,
}

impl ReaderRelation {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_member(mut self, member_type: MemberType, reference: u64, role: &str) -> Self {
        self.members.push(RelationMember {
            member_type,
            reference,
            role: role.to_string(),
        });
        self
    }

    /// Ids of member ways, in member order.
    pub fn way_members(&self) -> impl Iterator<Item = u64> + '_ {
        self.members
            .iter()
            .filter(|m| m.member_type == MemberType::Way)
            .map(|m| m.reference)
    }

    /// The first member of the given type and role.
    pub fn member(&self, member_type: MemberType, role: &str) -> Option<u64> {
        self.members
            .iter()
            .find(|m| m.member_type == member_type && m.role == role)
            .map(|m| m.reference)
    }
}

impl Tagged for ReaderRelation {
    fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }
}

/// A batch of elements from the map reader, as read by the command line tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsmBatch {
    #[serde(default)]
    pub nodes: Vec<ReaderNode>,
    #[serde(default)]
    pub ways: Vec<ReaderWay>,
    #[serde(default)]
    pub relations: Vec<ReaderRelation>,
}

#[cfg(test)]
mod tests {
    use super::{MemberType, OsmBatch, ReaderRelation, ReaderWay, Tagged, split_values};

    #[test]
    fn tag_helpers() {
        let way = ReaderWay::new(1)
            .with_tag("highway", "primary")
            .with_tag("vehicle", "no; delivery")
            .with_tag("access", "yes");
        assert!(way.has_tag("highway", "primary"));
        assert!(way.has_tag_in("highway", &["primary", "secondary"]));
        assert_eq!(
            way.first_priority_tag(&["motorcar", "vehicle", "access"]),
            Some("no; delivery")
        );
        assert_eq!(way.tag_values("vehicle"), vec!["no", "delivery"]);
        assert!(way.tag_values("motorcar").is_empty());
        assert_eq!(split_values(";;a; b ;"), vec!["a", "b"]);
    }

    #[test]
    fn geometry() {
        let mut way = ReaderWay::new(1);
        assert_eq!(way.length(), None);
        // roughly 111 km per degree of latitude
        way.coordinates = vec![[10.0, 50.0], [10.0, 50.001], [10.001, 50.001]];
        let length = way.length().expect("has geometry");
        assert!(length > 180.0 && length < 190.0, "{length}");
        let beeline = way.beeline().expect("has geometry");
        assert!(beeline < length);
    }

    #[test]
    fn batch_from_json() {
        let batch: OsmBatch = serde_json::from_str(
            r#"{
                "ways": [{"id": 7, "tags": {"highway": "track"}, "nodes": [1, 2]}],
                "relations": [{"id": 3, "tags": {"type": "restriction"},
                    "members": [{"type": "way", "ref": 7, "role": "from"}]}]
            }"#,
        )
        .expect("valid batch");
        assert_eq!(batch.ways[0].tag("highway"), Some("track"));
        assert_eq!(batch.relations[0].member(MemberType::Way, "from"), Some(7));
        assert_eq!(
            ReaderRelation::new(1)
                .with_member(MemberType::Way, 4, "")
                .way_members()
                .collect::<Vec<_>>(),
            vec![4]
        );
    }
}
