// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::{BoundingBox, PathNode, Point};

/// Identifier of a [Way].
///
/// Plain OSM ways are identified by their numeric id. Ways merged from
/// several roundabout fragments get a canonical id derived from the sorted
/// ids of their members, see [WayId::merged].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WayId(String);

impl WayId {
    /// Creates the canonical id of a way merged from the provided members.
    /// The result does not depend on the order of `members`.
    pub fn merged<'a, I: IntoIterator<Item = &'a WayId>>(members: I) -> Self {
        let mut ids: Vec<&str> = members.into_iter().map(|id| id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        Self(format!("merged:{}", ids.join("+")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_merged(&self) -> bool {
        self.0.starts_with("merged:")
    }
}

impl From<i64> for WayId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for WayId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for WayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a graph vertex of a [MapArea](crate::MapArea).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub pos: Point,
    pub tags: HashMap<String, String>,

    /// Ids of all [Ways](Way) with this node in their path.
    pub ways: Vec<WayId>,
}

impl Node {
    pub fn as_path_node(&self) -> PathNode {
        PathNode::new(self.id, self.pos)
    }
}

/// Allowed direction of travel over a [Way].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The way may be travelled in both directions.
    Both,

    /// The way may only be travelled from the first to the last node of its path.
    Forward,
}

/// Represents a street or a path: an ordered sequence of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: WayId,

    /// Type classification, customary the value of the `highway` tag.
    pub kind: String,

    /// Display name, customary the value of the `name` tag.
    pub name: Option<String>,

    pub tags: HashMap<String, String>,
    pub direction: Direction,

    /// Nodes of the way. Never empty.
    pub path: Vec<PathNode>,

    pub bounds: BoundingBox,
}

impl Way {
    pub fn is_oneway(&self) -> bool {
        self.direction == Direction::Forward
    }

    /// Checks if the way is explicitly tagged as a roundabout.
    pub fn is_roundabout(&self) -> bool {
        is_roundabout_tagged(&self.tags)
    }

    /// Checks if the first and the last node of the way coincide.
    pub fn is_closed(&self) -> bool {
        match (self.path.first(), self.path.last()) {
            (Some(first), Some(last)) => self.path.len() > 2 && first.coincides(last),
            _ => false,
        }
    }

    /// Returns the path of a closed way without its repeated closing node.
    pub fn ring(&self) -> &[PathNode] {
        if self.is_closed() {
            &self.path[..self.path.len() - 1]
        } else {
            &self.path
        }
    }

    /// Checks if travelling past the last node of the way leads back to its first node.
    ///
    /// This holds for closed ways and for ways merged from roundabout fragments,
    /// whose paths are stored without the repeated closing node.
    pub fn is_cyclic(&self) -> bool {
        self.is_closed() || self.id.is_merged()
    }

    /// Returns the closed loop around a cyclic way, starting and ending at the node
    /// with the given id. Returns `None` if the way is not cyclic or doesn't contain the node.
    pub fn rotated_from(&self, node_id: i64) -> Option<Vec<PathNode>> {
        if !self.is_cyclic() {
            return None;
        }

        let ring = self.ring();
        let idx = ring.iter().position(|n| n.id == Some(node_id))?;

        let mut rotated = Vec::with_capacity(ring.len() + 1);
        rotated.extend_from_slice(&ring[idx..]);
        rotated.extend_from_slice(&ring[..idx]);
        rotated.push(ring[idx]);
        Some(rotated)
    }

    pub fn first(&self) -> &PathNode {
        &self.path[0]
    }

    pub fn last(&self) -> &PathNode {
        &self.path[self.path.len() - 1]
    }

    /// Returns the index of the first occurrence of a node with the given id in the path.
    pub fn position_of(&self, node_id: i64) -> Option<usize> {
        self.path.iter().position(|n| n.id == Some(node_id))
    }

    /// Name for presentation: the street name if known, otherwise the way type.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("unnamed {}", self.kind),
        }
    }
}

pub(crate) fn is_roundabout_tagged(tags: &HashMap<String, String>) -> bool {
    matches!(
        tags.get("junction").map(|v| v.as_str()),
        Some("roundabout") | Some("circular")
    ) || tags.get("roundabout").map(|v| v.as_str()) == Some("yes")
}
