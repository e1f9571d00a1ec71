// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value;

use crate::model::{Direction, Node, Way, WayId};
use crate::osm::Profile;
use crate::{BoundingBox, ParseError, PathNode, Point};

/// Represents an [Overpass JSON](https://wiki.openstreetmap.org/wiki/OSM_JSON) response.
#[derive(Debug, Deserialize)]
struct Response {
    elements: Vec<Element>,
}

/// Represents a single [OSM element](https://wiki.openstreetmap.org/wiki/Elements)
/// of an Overpass JSON response. Only fields relevant to ways and nodes are kept.
#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    type_: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    nodes: Vec<i64>,
    bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Bounds {
    minlat: f64,
    minlon: f64,
    maxlat: f64,
    maxlon: f64,
}

impl From<Bounds> for BoundingBox {
    fn from(b: Bounds) -> Self {
        Self {
            south: b.minlat,
            west: b.minlon,
            north: b.maxlat,
            east: b.maxlon,
        }
    }
}

/// Node and way lookups parsed from a geodata query result,
/// ready to be turned into a [MapArea](crate::MapArea).
#[derive(Debug, Default, Clone)]
pub struct AreaData {
    pub nodes: HashMap<i64, Node>,

    /// All loaded ways, in the order of the query result.
    pub ways: Vec<Way>,

    /// Number of loaded ways per type.
    pub stats: BTreeMap<String, usize>,
}

/// Parses an Overpass JSON query result into [AreaData], as per the provided [Profile].
///
/// - ways without a `highway` tag, or disallowed by the profile, are skipped;
/// - references to unknown nodes are removed, and ways left without nodes are skipped;
/// - ways which may only be travelled backwards are reversed, so that
///   every one-way way has [Direction::Forward];
/// - mis-tagged roundabout fragments are retagged with `junction=roundabout`;
/// - nodes which are not used by any way are removed.
pub fn parse(json: &Value, profile: &Profile) -> Result<AreaData, ParseError> {
    let response = Response::deserialize(json)?;
    let mut data = AreaData::default();
    let mut way_elements = Vec::new();

    // Parse nodes before ways, in case ways refer to nodes before they are specified.
    for element in response.elements {
        match element.type_.as_str() {
            "node" => match (element.lat, element.lon) {
                (Some(lat), Some(lon)) => {
                    data.nodes.insert(
                        element.id,
                        Node {
                            id: element.id,
                            pos: Point::new(lat, lon),
                            tags: element.tags,
                            ways: Vec::new(),
                        },
                    );
                }
                _ => log::warn!("node {} has no position - skipping", element.id),
            },
            "way" => way_elements.push(element),
            "relation" | "area" => {}
            other => log::warn!("unknown element type {:?} (id {})", other, element.id),
        }
    }

    for element in way_elements {
        if let Some(way) = build_way(&data.nodes, element, profile) {
            for node in way.path.iter() {
                if let Some(node) = node.id.and_then(|id| data.nodes.get_mut(&id)) {
                    if !node.ways.contains(&way.id) {
                        node.ways.push(way.id.clone());
                    }
                }
            }
            *data.stats.entry(way.kind.clone()).or_default() += 1;
            data.ways.push(way);
        }
    }

    data.nodes.retain(|_, node| !node.ways.is_empty());

    log::debug!(
        "parsed {} nodes and {} ways",
        data.nodes.len(),
        data.ways.len()
    );
    Ok(data)
}

fn build_way(nodes: &HashMap<i64, Node>, element: Element, profile: &Profile) -> Option<Way> {
    let mut tags = element.tags;
    let kind = tags.get("highway")?.clone();

    if !profile.is_allowed(&tags) {
        return None;
    }

    normalize_roundabout_tags(&kind, &mut tags);

    let mut path: Vec<PathNode> = element
        .nodes
        .iter()
        .filter_map(|id| nodes.get(id))
        .map(Node::as_path_node)
        .collect();

    if path.len() != element.nodes.len() {
        log::debug!(
            "way {} references {} unknown node(s)",
            element.id,
            element.nodes.len() - path.len()
        );
    }

    if path.is_empty() {
        log::warn!("way {} has no known nodes - skipping", element.id);
        return None;
    }

    let direction = match profile.way_direction(&tags) {
        (true, true) => Direction::Both,
        (true, false) => Direction::Forward,
        (false, true) => {
            path.reverse();
            Direction::Forward
        }
        (false, false) => return None,
    };

    let bounds = match element.bounds {
        Some(b) => b.into(),
        None => BoundingBox::from_points(path.iter().map(|n| n.pos))?,
    };

    Some(Way {
        id: WayId::from(element.id),
        kind,
        name: tags.get("name").cloned(),
        tags,
        direction,
        path,
        bounds,
    })
}

/// Retags ways which describe roundabouts without `junction=roundabout`.
fn normalize_roundabout_tags(kind: &str, tags: &mut HashMap<String, String>) {
    let circular = tags.get("junction").map(|v| v.as_str()) == Some("circular");
    if circular || kind == "mini_roundabout" {
        tags.insert("junction".to_string(), "roundabout".to_string());
    }
}
