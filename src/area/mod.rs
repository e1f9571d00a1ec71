// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Queryable road graph of a single spatial tile.

use std::collections::{BTreeMap, HashMap};

use crate::model::{Node, Way, WayId};
use crate::osm::AreaData;
use crate::{bearing, nearest_on_polyline, same_point, BoundingBox, PathNode, Point, PolylineMatch};

mod branch;
mod roundabout;

pub use branch::{Branch, Part, SegmentInfo, Split};

/// Result of [MapArea::nearest_path].
#[derive(Debug, Clone, PartialEq)]
pub struct NearestPath {
    pub way_id: WayId,
    pub distance: f64,

    /// Nearest place on the way's path.
    pub matched: PolylineMatch,
}

/// Place where a position projects onto a way, see [MapArea::locate_crossing].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WayCrossing {
    /// The crossing point. Transient (without id) if interpolated between two path nodes.
    pub point: PathNode,

    /// Index of the path node at the crossing, or, for interpolated points,
    /// index of the first node of the segment containing the crossing.
    pub index: usize,

    /// Whether the crossing coincides with `path[index]`.
    pub on_vertex: bool,
}

/// Which end of a path to measure a heading at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Start,
    End,
}

/// Represents the road network of one spatial tile as a set of [Nodes](Node)
/// and [Ways](Way), cross-referenced by ids.
///
/// A MapArea is immutable after construction. The constructor normalizes
/// roundabouts: fragments of one physical roundabout are merged into a single way,
/// and untagged closed ways are tagged with `roundabout=yes`.
#[derive(Debug, Clone)]
pub struct MapArea {
    nodes: HashMap<i64, Node>,
    ways: HashMap<WayId, Way>,
    order: Vec<WayId>,
    stats: BTreeMap<String, usize>,
    center: Point,
    bounds: BoundingBox,
}

impl MapArea {
    /// Creates a new MapArea from parsed query results.
    ///
    /// `center` is the position the area was queried for,
    /// and `bounds` the boundary of the query.
    pub fn new(data: AreaData, center: Point, bounds: BoundingBox) -> Self {
        let order = data.ways.iter().map(|w| w.id.clone()).collect();
        let ways = data.ways.into_iter().map(|w| (w.id.clone(), w)).collect();

        let mut area = Self {
            nodes: data.nodes,
            ways,
            order,
            stats: data.stats,
            center,
            bounds,
        };
        area.normalize_roundabouts();
        area
    }

    /// Returns the number of ways in the area.
    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    /// Returns the number of nodes in the area.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of ways per type, as returned by the query.
    pub fn stats(&self) -> &BTreeMap<String, usize> {
        &self.stats
    }

    /// Position the area was queried around.
    pub fn center(&self) -> Point {
        self.center
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn contains(&self, p: Point) -> bool {
        self.bounds.contains(p)
    }

    /// Retrieves a [Node] with the provided id.
    pub fn node(&self, id: i64) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Retrieves a [Way] with the provided id.
    pub fn way(&self, id: &WayId) -> Option<&Way> {
        self.ways.get(id)
    }

    /// Returns an iterator over all [Ways](Way), in the order of the query result.
    pub fn ways(&self) -> impl Iterator<Item = &Way> {
        self.order.iter().filter_map(|id| self.ways.get(id))
    }

    /// Returns ids of all ways meeting at a node with the given id.
    pub fn incident_ways(&self, node_id: i64) -> &[WayId] {
        self.nodes
            .get(&node_id)
            .map(|n| n.ways.as_slice())
            .unwrap_or_default()
    }

    /// Checks if the way with the given id is a roundabout.
    pub fn is_roundabout(&self, id: &WayId) -> bool {
        self.way(id).map_or(false, |w| w.is_roundabout())
    }

    /// Finds the [Way] closest to the given position.
    ///
    /// This function requires computing the distance to every [Way] in the area.
    /// If multiple ways are equally close, the first one (in the order of
    /// [MapArea::ways]) is returned.
    pub fn nearest_path(&self, p: Point) -> Option<NearestPath> {
        let mut best: Option<NearestPath> = None;

        for way in self.ways() {
            if let Some(matched) = nearest_on_polyline(p, &way.path) {
                if best.as_ref().map_or(true, |b| matched.distance < b.distance) {
                    best = Some(NearestPath {
                        way_id: way.id.clone(),
                        distance: matched.distance,
                        matched,
                    });
                }
            }
        }

        best
    }

    /// Finds where the given position projects onto a way.
    ///
    /// Projections within [SNAP_DISTANCE](crate::SNAP_DISTANCE) of a path node
    /// are snapped to that node.
    pub fn locate_crossing(&self, way_id: &WayId, p: Point) -> Option<WayCrossing> {
        let way = self.way(way_id)?;
        let m = nearest_on_polyline(p, &way.path)?;

        let vertex = m.vertex.or_else(|| {
            [m.index, m.index + 1]
                .into_iter()
                .filter(|&idx| idx < way.path.len())
                .find(|&idx| same_point(way.path[idx].pos, m.pos))
        });

        Some(match vertex {
            Some(idx) => WayCrossing {
                point: way.path[idx],
                index: idx,
                on_vertex: true,
            },
            None => WayCrossing {
                point: PathNode::transient(m.pos),
                index: m.index,
                on_vertex: false,
            },
        })
    }

    /// Calculates the bearing at the start (of the first two points)
    /// or at the end (of the last two points) of a path over the given way.
    ///
    /// Roundabouts always use the first two points of the way itself,
    /// regardless of where `path` starts, to give a stable entering heading.
    pub fn heading(&self, way_id: &WayId, path: &[PathNode], end: End) -> Option<f64> {
        if let Some(way) = self.way(way_id).filter(|w| w.is_roundabout()) {
            if way.path.len() >= 2 {
                return Some(bearing(way.path[0].pos, way.path[1].pos));
            }
        }

        if path.len() < 2 {
            return None;
        }

        let (a, b) = match end {
            End::Start => (path[0].pos, path[1].pos),
            End::End => (path[path.len() - 2].pos, path[path.len() - 1].pos),
        };

        if a == b {
            None
        } else {
            Some(bearing(a, b))
        }
    }
}
