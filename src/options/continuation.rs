// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::rc::Rc;

use crate::area::Part;
use crate::{MapArea, PathNode, WayId};

/// A candidate next leg of travel.
///
/// The first node of the path is the current position,
/// the last node is where the leg leads.
#[derive(Debug, Clone)]
pub struct Continuation {
    /// Way the tail of the path runs over.
    pub way_id: WayId,
    pub path: Vec<PathNode>,

    /// Set if the tail of the leg runs against the order of the path
    /// of [way_id](Self::way_id).
    pub reversed: bool,

    /// Set if the leg runs around a roundabout.
    pub roundabout: bool,

    /// Precomputed continuations from the tail of this leg.
    pub next: Option<Vec<Continuation>>,

    /// Tile this leg was computed from.
    pub area: Option<Rc<MapArea>>,

    /// Signed difference between the heading of this leg and the heading
    /// of the leg it continues, in degrees. Positive values turn right.
    pub heading_delta: Option<f64>,
}

impl Continuation {
    pub fn new(way_id: WayId, path: Vec<PathNode>) -> Self {
        Self {
            way_id,
            path,
            reversed: false,
            roundabout: false,
            next: None,
            area: None,
            heading_delta: None,
        }
    }

    pub(crate) fn from_part(part: Part, area: &Rc<MapArea>) -> Self {
        Self {
            roundabout: area.is_roundabout(&part.way_id),
            reversed: part.reversed,
            area: Some(area.clone()),
            ..Self::new(part.way_id, part.path)
        }
    }

    pub fn head(&self) -> Option<&PathNode> {
        self.path.first()
    }

    pub fn tail(&self) -> Option<&PathNode> {
        self.path.last()
    }

    /// Returns the id of the node this leg leads to,
    /// or `None` if it ends at a transient point.
    pub fn end_node_id(&self) -> Option<i64> {
        self.tail().and_then(|n| n.id)
    }

    /// Appends another leg, starting at the tail of this one.
    /// The way (and direction) of the appended leg becomes the way of this leg.
    pub fn splice(&mut self, other: Continuation) {
        self.path.extend(other.path.into_iter().skip(1));
        self.way_id = other.way_id;
        self.reversed = other.reversed;
        self.roundabout = other.roundabout;
        if other.area.is_some() {
            self.area = other.area;
        }
        self.next = other.next;
    }

    /// Length of the leg in meters.
    pub fn length(&self) -> f64 {
        self.path
            .windows(2)
            .map(|w| crate::earth_distance(w[0].pos, w[1].pos))
            .sum()
    }
}

impl PartialEq for Continuation {
    /// Two continuations are equal if they describe the same leg;
    /// lookahead, tiles and ranking data are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.way_id == other.way_id && self.path == other.path && self.reversed == other.reversed
    }
}
