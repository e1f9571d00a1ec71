// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashSet;

use super::{MapArea, WayCrossing};
use crate::model::{Way, WayId};
use crate::PathNode;

/// A directed piece of a [Way], starting at the point where it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub way_id: WayId,
    pub path: Vec<PathNode>,

    /// Set if the part runs against the order of the way's path.
    pub reversed: bool,
}

/// Result of [MapArea::first_branch].
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub point: PathNode,

    /// Index of the branching point in the scanned path.
    pub index: usize,

    /// Ways which may be entered at the branching point.
    pub candidates: Vec<WayId>,
}

/// Result of [MapArea::split_at_first_branch].
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub way_id: WayId,

    /// The scanned path, up to and including the first branching point.
    pub path: Vec<PathNode>,

    /// Parts leaving the branching point. The remainder of the split way,
    /// if any, always comes first.
    pub branches: Vec<Part>,
}

/// Result of [MapArea::build_segment_info].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentInfo {
    /// Parts cut at their first branching point.
    pub segments: Vec<Part>,

    /// Ids of all nodes on all segments.
    pub visited: HashSet<i64>,
}

impl MapArea {
    /// Finds the first node of `path` (which runs over the way `way_id`)
    /// where a different way may be entered.
    ///
    /// The first and the last node of the path are not considered. Ways are
    /// not considered as branches if they're equal to `ignore`, or if they
    /// are one-way and may only be left at the branching node.
    pub fn first_branch(
        &self,
        way_id: &WayId,
        path: &[PathNode],
        ignore: Option<&WayId>,
    ) -> Option<Branch> {
        if path.len() < 3 {
            return None;
        }

        for (index, point) in path.iter().enumerate().take(path.len() - 1).skip(1) {
            let Some(node_id) = point.id else {
                continue;
            };

            let incident = self.incident_ways(node_id);
            if incident.len() < 2 {
                continue;
            }

            let candidates: Vec<WayId> = incident
                .iter()
                .filter(|&id| id != way_id && Some(id) != ignore)
                .filter(|&id| self.way(id).map_or(false, |w| can_enter_at(w, node_id)))
                .cloned()
                .collect();

            if !candidates.is_empty() {
                return Some(Branch {
                    point: *point,
                    index,
                    candidates,
                });
            }
        }

        None
    }

    /// Cuts `path` (running over `way_id`) at its first branch, returning
    /// the path leading to the branch and all parts leaving it.
    pub fn split_at_first_branch(&self, way_id: &WayId, path: &[PathNode]) -> Split {
        self.split_impl(way_id, path, None)
    }

    fn split_impl(&self, way_id: &WayId, path: &[PathNode], ignore: Option<&WayId>) -> Split {
        let Some(branch) = self.first_branch(way_id, path, ignore) else {
            return Split {
                way_id: way_id.clone(),
                path: path.to_vec(),
                branches: Vec::new(),
            };
        };

        let mut branches = Vec::new();

        let remainder = &path[branch.index..];
        if remainder.len() > 1 {
            branches.push(Part {
                way_id: way_id.clone(),
                path: remainder.to_vec(),
                reversed: false,
            });
        }

        // Branch point always has an id, see first_branch
        if let Some(node_id) = branch.point.id {
            for candidate in branch.candidates.iter() {
                branches.extend(self.parts_leaving(candidate, node_id, way_id));
            }
        }

        Split {
            way_id: way_id.clone(),
            path: path[..=branch.index].to_vec(),
            branches,
        }
    }

    /// Returns the parts of way `way_id` leaving the node `node_id`,
    /// each cut at its own first branch. `from` is the way the node was
    /// approached with, and is not considered a branch.
    pub fn parts_leaving(&self, way_id: &WayId, node_id: i64, from: &WayId) -> Vec<Part> {
        let Some(way) = self.way(way_id) else {
            return Vec::new();
        };

        let mut raw: Vec<(Vec<PathNode>, bool)> = Vec::new();

        if let Some(ring) = way.rotated_from(node_id) {
            if !way.is_oneway() {
                raw.push((ring.iter().rev().cloned().collect(), true));
            }
            raw.insert(0, (ring, false));
        } else {
            for (idx, _) in way
                .path
                .iter()
                .enumerate()
                .filter(|(_, n)| n.id == Some(node_id))
            {
                if idx + 1 < way.path.len() {
                    raw.push((way.path[idx..].to_vec(), false));
                }
                if idx > 0 && !way.is_oneway() {
                    raw.push((way.path[..=idx].iter().rev().cloned().collect(), true));
                }
            }
        }

        raw.into_iter()
            .map(|(path, reversed)| Part {
                path: self.cut_at_first_branch(way_id, path, Some(from)),
                way_id: way_id.clone(),
                reversed,
            })
            .collect()
    }

    /// Truncates `path` after its first branch.
    pub(crate) fn cut_at_first_branch(
        &self,
        way_id: &WayId,
        mut path: Vec<PathNode>,
        ignore: Option<&WayId>,
    ) -> Vec<PathNode> {
        if let Some(branch) = self.first_branch(way_id, &path, ignore) {
            path.truncate(branch.index + 1);
        }
        path
    }

    /// Splits a way at a crossing into the parts leading back towards
    /// the start of the way and forward towards its end.
    ///
    /// Backward parts come first and are never produced for one-way ways;
    /// cyclic ways produce parts leading around the ring. If the crossing lies
    /// on a node shared with other ways, parts of those ways leaving the
    /// crossing are appended.
    pub fn split_at_crossing_point(&self, way_id: &WayId, crossing: &WayCrossing) -> Vec<Part> {
        let Some(way) = self.way(way_id) else {
            return Vec::new();
        };

        let p = crossing.point;
        let mut parts = Vec::new();

        let forward: Vec<PathNode> = if way.is_cyclic() {
            match (crossing.on_vertex, p.id) {
                (true, Some(node_id)) => way.rotated_from(node_id).unwrap_or_default(),
                _ => {
                    let ring = way.ring();
                    let i = crossing.index.min(ring.len().saturating_sub(1));
                    let mut loop_path = Vec::with_capacity(ring.len() + 2);
                    loop_path.push(p);
                    loop_path.extend_from_slice(&ring[i + 1..]);
                    loop_path.extend_from_slice(&ring[..=i]);
                    loop_path.push(p);
                    loop_path
                }
            }
        } else if crossing.on_vertex {
            way.path[crossing.index..].to_vec()
        } else {
            let mut path = vec![p];
            path.extend_from_slice(&way.path[crossing.index + 1..]);
            path
        };

        if !way.is_oneway() {
            let backward: Vec<PathNode> = if way.is_cyclic() {
                forward.iter().rev().cloned().collect()
            } else if crossing.on_vertex {
                way.path[..=crossing.index].iter().rev().cloned().collect()
            } else {
                let mut path = vec![p];
                path.extend(way.path[..=crossing.index].iter().rev());
                path
            };

            if backward.len() > 1 {
                parts.push(Part {
                    way_id: way_id.clone(),
                    path: backward,
                    reversed: true,
                });
            }
        }

        if forward.len() > 1 {
            parts.push(Part {
                way_id: way_id.clone(),
                path: forward,
                reversed: false,
            });
        }

        if let (true, Some(node_id)) = (crossing.on_vertex, p.id) {
            for sibling in self.incident_ways(node_id).iter().filter(|&id| id != way_id) {
                parts.extend(self.parts_leaving(sibling, node_id, way_id));
            }
        }

        parts
    }

    /// Cuts every part at its first branch, and collects all visited nodes.
    ///
    /// Crossings with `from_way` (the way the parts were split from) are not
    /// considered branches on parts of other ways.
    pub fn build_segment_info(&self, from_way: &WayId, parts: &[Part]) -> SegmentInfo {
        let mut info = SegmentInfo::default();

        for part in parts {
            let ignore = Some(from_way).filter(|&id| *id != part.way_id);
            let split = self.split_impl(&part.way_id, &part.path, ignore);

            info.visited.extend(split.path.iter().filter_map(|n| n.id));
            info.segments.push(Part {
                way_id: split.way_id,
                path: split.path,
                reversed: part.reversed,
            });
        }

        info
    }
}

/// Checks if a way may be entered at the node with the given id.
/// One-way ways can't be entered at their terminal node.
fn can_enter_at(way: &Way, node_id: i64) -> bool {
    if !way.is_oneway() || way.is_cyclic() {
        return true;
    }

    way.path
        .iter()
        .take(way.path.len().saturating_sub(1))
        .any(|n| n.id == Some(node_id))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{area_from_json, fixture_area, ids};
    use super::*;
    use crate::Point;
    use serde_json::json;

    fn path_of(area: &MapArea, id: i64) -> Vec<PathNode> {
        area.way(&WayId::from(id)).unwrap().path.clone()
    }

    fn part_ids(parts: &[Part]) -> Vec<(&str, Vec<i64>, bool)> {
        parts
            .iter()
            .map(|p| (p.way_id.as_str(), ids(&p.path), p.reversed))
            .collect()
    }

    #[test]
    fn first_branch() {
        let area = fixture_area();
        let main = WayId::from(100);

        let branch = area.first_branch(&main, &path_of(&area, 100), None).unwrap();
        assert_eq!(branch.index, 1);
        assert_eq!(branch.point.id, Some(2));
        assert_eq!(branch.candidates, [WayId::from(101)]);

        assert_eq!(
            area.first_branch(&main, &path_of(&area, 100), Some(&WayId::from(101))),
            None
        );
    }

    #[test]
    fn first_branch_around_roundabout() {
        let area = fixture_area();
        let roundabout = area.ways().find(|w| w.is_roundabout()).unwrap();
        let ring = roundabout.rotated_from(10).unwrap();

        let branch = area.first_branch(&roundabout.id, &ring, None).unwrap();
        assert_eq!(branch.point.id, Some(12));
        assert_eq!(branch.candidates, [WayId::from(106)]);
    }

    fn oneway_junction() -> MapArea {
        area_from_json(json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 0.0, "lon": 0.0},
                {"type": "node", "id": 2, "lat": 0.001, "lon": 0.0},
                {"type": "node", "id": 3, "lat": 0.002, "lon": 0.0},
                {"type": "node", "id": 4, "lat": 0.001, "lon": -0.001},
                {"type": "node", "id": 5, "lat": 0.001, "lon": 0.001},
                {"type": "way", "id": 1, "nodes": [1, 2, 3], "tags": {"highway": "residential"}},
                {"type": "way", "id": 2, "nodes": [4, 2], "tags": {"highway": "residential", "oneway": "yes"}},
                {"type": "way", "id": 3, "nodes": [2, 5], "tags": {"highway": "residential", "oneway": "yes"}},
            ]
        }))
    }

    #[test]
    fn first_branch_excludes_oneway_terminals() {
        let area = oneway_junction();
        let branch = area
            .first_branch(&WayId::from(1), &path_of(&area, 1), None)
            .unwrap();
        assert_eq!(branch.candidates, [WayId::from(3)]);

        let without_exit = area.first_branch(&WayId::from(1), &path_of(&area, 1), Some(&WayId::from(3)));
        assert_eq!(without_exit, None);
    }

    #[test]
    fn split_at_first_branch() {
        let area = fixture_area();
        let split = area.split_at_first_branch(&WayId::from(100), &path_of(&area, 100));

        assert_eq!(ids(&split.path), [1, 2]);
        assert_eq!(
            part_ids(&split.branches),
            [
                ("100", vec![2, 3], false),
                ("101", vec![2, 5], false),
                ("101", vec![2, 4], true),
            ]
        );
    }

    #[test]
    fn split_and_rejoin() {
        let area = fixture_area();
        for way in area.ways() {
            let split = area.split_at_first_branch(&way.id, &way.path);
            let mut rejoined = split.path.clone();
            if let Some(first) = split.branches.first() {
                assert_eq!(first.way_id, way.id);
                rejoined.extend_from_slice(&first.path[1..]);
            }

            assert!(rejoined.len() >= split.path.len());
            assert_eq!(rejoined, way.path[..rejoined.len()]);
        }
    }

    #[test]
    fn split_into_roundabout() {
        let area = fixture_area();
        let split = area.split_at_first_branch(&WayId::from(102), &path_of(&area, 102));

        // Cross Street ends at the roundabout, which is not a branch
        assert_eq!(ids(&split.path), [5, 10]);
        assert!(split.branches.is_empty());
    }

    fn single_way() -> MapArea {
        area_from_json(json!({
            "elements": [
                {"type": "node", "id": 1, "lat": 0.0, "lon": 0.0},
                {"type": "node", "id": 2, "lat": 0.001, "lon": 0.0},
                {"type": "node", "id": 3, "lat": 0.002, "lon": 0.0},
                {"type": "way", "id": 1, "nodes": [1, 2, 3], "tags": {"highway": "residential"}},
            ]
        }))
    }

    #[test]
    fn split_at_crossing_vertex() {
        let area = single_way();
        let way = WayId::from(1);
        let crossing = area.locate_crossing(&way, Point::new(0.001, 0.0)).unwrap();

        let parts = area.split_at_crossing_point(&way, &crossing);
        assert_eq!(
            part_ids(&parts),
            [("1", vec![2, 1], true), ("1", vec![2, 3], false)]
        );
    }

    #[test]
    fn split_at_interpolated_crossing() {
        let area = fixture_area();
        let main = WayId::from(100);
        let crossing = area.locate_crossing(&main, Point::new(50.0005, 20.0001)).unwrap();

        let parts = area.split_at_crossing_point(&main, &crossing);
        assert_eq!(
            part_ids(&parts),
            [("100", vec![0, 1], true), ("100", vec![0, 2, 3], false)]
        );
        assert!(parts.iter().all(|p| p.path[0].is_transient()));
    }

    #[test]
    fn split_at_crossing_adds_siblings() {
        let area = fixture_area();
        let cross = WayId::from(101);
        let crossing = area.locate_crossing(&cross, Point::new(50.0010, 20.0010)).unwrap();
        assert_eq!(crossing.point.id, Some(5));

        let parts = area.split_at_crossing_point(&cross, &crossing);
        assert_eq!(
            part_ids(&parts),
            [("101", vec![5, 2, 4], true), ("102", vec![5, 10], false)]
        );
    }

    #[test]
    fn split_oneway_at_crossing() {
        let area = fixture_area();
        let alley = WayId::from(106);
        let crossing = area.locate_crossing(&alley, Point::new(50.0011, 20.0030)).unwrap();
        assert!(!crossing.on_vertex);

        let parts = area.split_at_crossing_point(&alley, &crossing);
        assert_eq!(part_ids(&parts), [("106", vec![0, 20], false)]);
    }

    #[test]
    fn segment_info() {
        let area = fixture_area();
        let main = WayId::from(100);
        let crossing = area.locate_crossing(&main, Point::new(50.0005, 20.0001)).unwrap();
        let parts = area.split_at_crossing_point(&main, &crossing);

        let info = area.build_segment_info(&main, &parts);
        assert_eq!(
            part_ids(&info.segments),
            [("100", vec![0, 1], true), ("100", vec![0, 2], false)]
        );
        assert_eq!(info.visited, HashSet::from([1, 2]));
    }
}
