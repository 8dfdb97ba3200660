//! Wire model for the Overpass interpreter's JSON output.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One OSM entity in a response. Which fields are filled depends on the
/// query's `out` mode: `out ids` gives only `type` and `id`, `out body`
/// adds tags and members, `out geom` adds way vertex coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Per-vertex coordinates of a way when `out geom` was requested.
    #[serde(default)]
    pub geometry: Vec<LonLat>,
}

impl Element {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

/// A relation member. The member's own id is called `ref` on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(rename = "ref")]
    pub id: i64,
    #[serde(default)]
    pub role: String,
}

#[derive(Copy, Clone, Debug, Deserialize)]
pub struct LonLat {
    pub lat: f64,
    pub lon: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_node_and_a_relation() -> Result<(), anyhow::Error> {
        let response: OverpassResponse = serde_json::from_str(
            r##"{
                "version": 0.6,
                "generator": "Overpass API",
                "elements": [
                    {
                        "type": "node",
                        "id": 5280644761,
                        "lat": -6.9218571,
                        "lon": 107.6048254,
                        "tags": { "highway": "bus_stop", "name": "Alun-Alun", "shelter": "yes" }
                    },
                    {
                        "type": "relation",
                        "id": 13538340,
                        "members": [
                            { "type": "node", "ref": 5280644761, "role": "platform" },
                            { "type": "way", "ref": 573291203, "role": "" }
                        ],
                        "tags": { "type": "route", "route": "bus" }
                    }
                ]
            }"##,
        )?;

        assert_eq!(response.elements.len(), 2);

        let node = &response.elements[0];
        assert_eq!(node.kind, ElementKind::Node);
        assert_eq!(node.tag("name"), Some("Alun-Alun"));
        assert!(node.members.is_empty());

        let relation = &response.elements[1];
        assert_eq!(relation.kind, ElementKind::Relation);
        assert_eq!(relation.members[0].id, 5280644761);
        assert_eq!(relation.members[0].role, "platform");
        Ok(())
    }

    #[test]
    fn parses_way_geometry() -> Result<(), anyhow::Error> {
        let response: OverpassResponse = serde_json::from_str(
            r##"{
                "elements": [
                    {
                        "type": "way",
                        "id": 573291203,
                        "geometry": [
                            { "lat": -6.92, "lon": 107.6 },
                            { "lat": -6.93, "lon": 107.61 }
                        ],
                        "tags": { "highway": "primary" }
                    }
                ]
            }"##,
        )?;

        let way = &response.elements[0];
        assert_eq!(way.geometry.len(), 2);
        assert_eq!(way.geometry[1].lon, 107.61);
        Ok(())
    }
}
