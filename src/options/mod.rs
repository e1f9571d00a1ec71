// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Enumeration of legal continuations from a position on the road graph.

use std::collections::HashSet;
use std::rc::Rc;

use crate::area::{MapArea, Part, WayCrossing};
use crate::model::Way;
use crate::tiles::{GeodataTransport, TileService};
use crate::{nearest_on_polyline, PathNode, WayId};

mod continuation;

pub use continuation::Continuation;

/// Generates [Continuations](Continuation) over a [MapArea].
///
/// The area is swapped for a fresher one whenever the [TileService]
/// returns a different tile for the position being extended.
pub struct OptionManager<'a, T: GeodataTransport> {
    tiles: &'a TileService<T>,
    area: Rc<MapArea>,
}

impl<'a, T: GeodataTransport> OptionManager<'a, T> {
    pub fn new(tiles: &'a TileService<T>, area: Rc<MapArea>) -> Self {
        Self { tiles, area }
    }

    /// Currently used tile.
    pub fn area(&self) -> &Rc<MapArea> {
        &self.area
    }

    /// Recovers the part of the way of `partial` which hasn't been travelled yet.
    ///
    /// The direction of travel is inferred from the last two points of `partial`.
    /// Roundabouts are returned in full and flagged as such.
    pub fn get_remaining(&self, partial: &Continuation) -> Option<Continuation> {
        let way = self.area.way(&partial.way_id)?;

        if way.is_roundabout() {
            let mut remaining = Continuation::new(way.id.clone(), way.path.clone());
            remaining.roundabout = true;
            remaining.area = Some(self.area.clone());
            return Some(remaining);
        }

        let (path, reversed) = remaining_along(way, partial)?;
        let mut remaining = Continuation::new(way.id.clone(), path);
        remaining.reversed = reversed;
        remaining.area = Some(self.area.clone());
        Some(remaining)
    }

    /// Returns the leg leading back along the way of `leg` from its tail,
    /// cut at the first branch.
    ///
    /// Returns `None` for one-way ways and roundabouts, and at the start of a way.
    pub fn reverse(&self, leg: &Continuation) -> Option<Continuation> {
        let way = self.area.way(&leg.way_id)?;
        if way.is_oneway() || way.is_roundabout() || way.is_cyclic() {
            return None;
        }

        let remaining = self.get_remaining(leg)?;
        let idx = way.position_of(remaining.head()?.id?)?;
        let (path, reversed) = if remaining.reversed {
            (way.path[idx..].to_vec(), false)
        } else {
            (way.path[..=idx].iter().rev().cloned().collect(), true)
        };

        let part = Part {
            path: self.area.cut_at_first_branch(&way.id, path, None),
            way_id: way.id.clone(),
            reversed,
        };
        let back = Continuation::from_part(part, &self.area);
        (back.path.len() >= 2).then_some(back)
    }

    /// Enumerates all legal continuations from the tail of `from`.
    ///
    /// Refreshes the tile for the tail position first. Continuations
    /// immediately returning along `from` are not produced, and at most
    /// one continuation is returned per end node.
    pub async fn get_next_options(&mut self, from: &Continuation) -> Vec<Continuation> {
        let Some(tail) = from.tail().copied() else {
            return Vec::new();
        };

        if let Some(area) = self.tiles.load(tail.pos).await {
            if !Rc::ptr_eq(&area, &self.area) {
                log::debug!("switching to tile around {}", area.center());
                self.area = area;
            }
        }

        // Find the node to continue from - transient tails are skipped
        let Some((node_pos, node_id)) = from
            .path
            .iter()
            .enumerate()
            .rev()
            .take(2)
            .find_map(|(i, n)| n.id.map(|id| (i, id)))
        else {
            return Vec::new();
        };
        let came_from = node_pos.checked_sub(1).map(|i| from.path[i]);

        let area = self.area.clone();
        let mut options: Vec<Continuation> = Vec::new();

        for way_id in area.incident_ways(node_id) {
            let Some(way) = area.way(way_id) else {
                continue;
            };

            if *way_id == from.way_id {
                options.extend(self.continue_along(way, from, node_id));
            } else {
                options.extend(
                    area.parts_leaving(way_id, node_id, &from.way_id)
                        .into_iter()
                        .map(|part| Continuation::from_part(part, &area)),
                );
            }
        }

        options.retain(|c| c.path.len() >= 2);
        for option in options.iter_mut() {
            self.extend_straight_through(option, &from.way_id);
        }
        options.retain(|c| !came_from.is_some_and(|prev| c.path[1].coincides(&prev)));

        remove_duplicates(options)
    }

    /// Produces continuations along the same way `from` runs over.
    fn continue_along(&self, way: &Way, from: &Continuation, node_id: i64) -> Vec<Continuation> {
        let parts = if way.is_cyclic() {
            let mut parts = vec![(way.rotated_from(node_id), false)];
            if !way.is_oneway() {
                let backward = way
                    .rotated_from(node_id)
                    .map(|ring| ring.into_iter().rev().collect());
                parts.push((backward, true));
            }
            parts
        } else {
            // Open roundabout fragments are split at the node too
            match remaining_along(way, from) {
                Some((path, reversed)) => vec![(Some(path), reversed)],
                None => Vec::new(),
            }
        };

        parts
            .into_iter()
            .filter_map(|(path, reversed)| Some((path?, reversed)))
            .map(|(path, reversed)| {
                let part = Part {
                    path: self.area.cut_at_first_branch(&way.id, path, None),
                    way_id: way.id.clone(),
                    reversed,
                };
                Continuation::from_part(part, &self.area)
            })
            .collect()
    }

    /// Extends a continuation ending at the end of its way by the only way
    /// leaving its tail, if there is exactly one such way.
    fn extend_straight_through(&self, option: &mut Continuation, from_way: &WayId) {
        let Some(end) = option.end_node_id() else {
            return;
        };
        let Some(way) = self.area.way(&option.way_id) else {
            return;
        };

        let ends_way = !way.is_cyclic()
            && match option.reversed {
                false => way.last().id == Some(end),
                true => way.first().id == Some(end),
            };
        if !ends_way {
            return;
        }

        let others: Vec<&WayId> = self
            .area
            .incident_ways(end)
            .iter()
            .filter(|&id| *id != option.way_id)
            .collect();
        let [next_way] = others.as_slice() else {
            return;
        };
        if *next_way == from_way {
            return;
        }

        let mut parts = self.area.parts_leaving(next_way, end, &option.way_id);
        if parts.len() == 1 {
            if let Some(part) = parts.pop() {
                log::debug!("extending {} straight through to {}", option.way_id, part.way_id);
                option.splice(Continuation::from_part(part, &self.area));
            }
        }
    }

    /// Enumerates the options for a position on `way_id`, which is not
    /// necessarily at a branching point.
    ///
    /// Every part leaving the crossing is cut at its first branch. If only one
    /// continuation leaves the tail of such a segment, it is spliced onto the
    /// segment, unless it returns to a node of any of the segments.
    pub async fn get_start_options(
        &mut self,
        way_id: &WayId,
        crossing: &WayCrossing,
    ) -> Vec<Continuation> {
        let area = self.area.clone();
        let parts = area.split_at_crossing_point(way_id, crossing);
        let info = area.build_segment_info(way_id, &parts);

        let mut options = Vec::with_capacity(info.segments.len());
        for segment in info.segments {
            let mut option = Continuation::from_part(segment, &area);
            let mut next = self.get_next_options(&option).await;

            match next.len() {
                0 => {}
                1 => {
                    if revisits(&next[0].path[1..], &info.visited) {
                        log::debug!("not extending start option over {}", option.way_id);
                    } else if let Some(n) = next.pop() {
                        option.splice(n);
                    }
                }
                _ => option.next = Some(next),
            }

            options.push(option);
        }

        options
    }
}

/// Returns the part of `way` not yet travelled by `partial`, starting at
/// the last point of `partial` lying on the way, and whether it runs
/// against the order of the way's path.
fn remaining_along(way: &Way, partial: &Continuation) -> Option<(Vec<PathNode>, bool)> {
    let (last_pos, last_idx) = partial
        .path
        .iter()
        .enumerate()
        .rev()
        .find_map(|(pos, n)| Some((pos, way.position_of(n.id?)?)))?;

    let forward = match last_pos.checked_sub(1).map(|i| &partial.path[i]) {
        Some(prev) => is_before(way, prev, last_idx),
        None => !partial.reversed,
    };

    Some(if forward {
        (way.path[last_idx..].to_vec(), false)
    } else {
        (way.path[..=last_idx].iter().rev().cloned().collect(), true)
    })
}

/// Checks if `p` lies before the path node at `idx` of `way`.
fn is_before(way: &Way, p: &PathNode, idx: usize) -> bool {
    if let Some(p_idx) = p.id.and_then(|id| way.position_of(id)) {
        return p_idx < idx;
    }

    match nearest_on_polyline(p.pos, &way.path) {
        Some(m) => m.vertex.unwrap_or(m.index) < idx,
        None => true,
    }
}

fn revisits(path: &[PathNode], visited: &HashSet<i64>) -> bool {
    path.iter().any(|n| n.id.is_some_and(|id| visited.contains(&id)))
}

/// Removes continuations leading to the same node as an earlier continuation,
/// and continuations without any length. The order is preserved.
pub fn remove_duplicates(options: Vec<Continuation>) -> Vec<Continuation> {
    let mut kept: Vec<Continuation> = Vec::with_capacity(options.len());

    for option in options {
        let Some(tail) = option.tail().filter(|_| option.path.len() >= 2) else {
            continue;
        };

        if !kept.iter().any(|k| k.tail().is_some_and(|t| t.coincides(tail))) {
            kept.push(option);
        }
    }

    kept
}
