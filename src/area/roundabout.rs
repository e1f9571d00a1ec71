// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{HashSet, VecDeque};

use super::MapArea;
use crate::model::{Way, WayId};
use crate::PathNode;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum MergeError {
    #[error("member way {0} is missing")]
    MissingMember(WayId),

    #[error("members of {0} do not form a closed chain")]
    Disconnected(WayId),
}

impl MapArea {
    /// Merges roundabouts recorded as multiple ways into single ways,
    /// and tags untagged closed ways with `roundabout=yes`.
    pub(super) fn normalize_roundabouts(&mut self) {
        for group in self.find_roundabout_groups() {
            match self.merge_roundabout(&group) {
                Ok(id) => log::debug!("merged {} roundabout fragments into {}", group.len(), id),
                Err(e) => log::warn!("failed to merge roundabout fragments {:?}: {}", group, e),
            }
        }

        for way in self.ways.values_mut() {
            if !way.is_roundabout() && way.is_closed() {
                way.tags.insert("roundabout".to_string(), "yes".to_string());
            }
        }
    }

    /// Finds groups of explicitly tagged roundabout ways which share nodes,
    /// in the order of [MapArea::ways]. Only groups with at least 2 members are returned.
    fn find_roundabout_groups(&self) -> Vec<Vec<WayId>> {
        let mut groups: Vec<Vec<WayId>> = Vec::new();
        let mut grouped: HashSet<&WayId> = HashSet::default();

        for start in self.order.iter() {
            if grouped.contains(start) || !self.is_roundabout(start) {
                continue;
            }

            let mut group = vec![start.clone()];
            let mut queue = VecDeque::from([start]);
            grouped.insert(start);

            while let Some(current) = queue.pop_front() {
                let Some(way) = self.ways.get(current) else {
                    continue;
                };

                for node_id in way.path.iter().filter_map(|n| n.id) {
                    for other in self.incident_ways(node_id) {
                        if !grouped.contains(other) && self.is_roundabout(other) {
                            grouped.insert(other);
                            group.push(other.clone());
                            queue.push_back(other);
                        }
                    }
                }
            }

            register_group(&mut groups, group);
        }

        groups
    }

    /// Replaces all members of a roundabout group by a single way.
    ///
    /// All checks are done before the area is modified,
    /// so that a failed merge leaves the area untouched.
    fn merge_roundabout(&mut self, group: &[WayId]) -> Result<WayId, MergeError> {
        let members = group
            .iter()
            .map(|id| {
                self.ways
                    .get(id)
                    .ok_or_else(|| MergeError::MissingMember(id.clone()))
            })
            .collect::<Result<Vec<&Way>, _>>()?;

        let id = WayId::merged(group);
        let path = chain_paths(&members).ok_or_else(|| MergeError::Disconnected(id.clone()))?;

        let first = members[0];
        let mut tags = first.tags.clone();
        tags.insert("roundabout".to_string(), "yes".to_string());

        let merged = Way {
            id: id.clone(),
            kind: first.kind.clone(),
            name: members.iter().find_map(|w| w.name.clone()),
            tags,
            direction: first.direction,
            bounds: members
                .iter()
                .skip(1)
                .fold(first.bounds, |acc, w| acc.union(&w.bounds)),
            path,
        };

        // Relabel references from nodes
        let member_set: HashSet<&WayId> = group.iter().collect();
        let member_nodes: HashSet<i64> = members
            .iter()
            .flat_map(|w| w.path.iter().filter_map(|n| n.id))
            .collect();

        for node_id in member_nodes {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                let mut relabeled: Vec<WayId> = Vec::with_capacity(node.ways.len());
                for way_id in node.ways.drain(..) {
                    let way_id = if member_set.contains(&way_id) {
                        id.clone()
                    } else {
                        way_id
                    };
                    if !relabeled.contains(&way_id) {
                        relabeled.push(way_id);
                    }
                }
                node.ways = relabeled;
            }
        }

        // Replace member ways, keeping the merged way at the position of the first member
        let first_position = self.order.iter().position(|w| member_set.contains(w));
        if let Some(position) = first_position {
            self.order[position] = id.clone();
        }
        self.order.retain(|w| !member_set.contains(w));
        group.iter().for_each(|member| {
            self.ways.remove(member);
        });
        self.ways.insert(id.clone(), merged);

        Ok(id)
    }
}

/// Adds a group to the list of groups. If any member already belongs to
/// a known group, the group with more members is kept (the known one on a tie).
fn register_group(groups: &mut Vec<Vec<WayId>>, group: Vec<WayId>) {
    if group.len() < 2 {
        return;
    }

    match groups
        .iter_mut()
        .find(|known| known.iter().any(|id| group.contains(id)))
    {
        Some(known) => {
            if group.len() > known.len() {
                *known = group;
            }
        }
        None => groups.push(group),
    }
}

/// Concatenates paths of roundabout fragments into a single path,
/// following the connections between their ends. Repeated nodes are removed,
/// including the closing node.
///
/// Returns `None` if the fragments don't form one closed chain.
fn chain_paths(members: &[&Way]) -> Option<Vec<PathNode>> {
    let (first, rest) = members.split_first()?;
    let mut path = first.path.clone();
    let mut remaining: Vec<&[PathNode]> = rest.iter().map(|w| w.path.as_slice()).collect();

    while !remaining.is_empty() {
        let tail = *path.last()?;
        let head = path[0];

        if let Some(idx) = remaining.iter().position(|p| p[0].coincides(&tail)) {
            let next = remaining.swap_remove(idx);
            path.extend_from_slice(&next[1..]);
        } else if let Some(idx) = remaining
            .iter()
            .position(|p| p[p.len() - 1].coincides(&head))
        {
            let prev = remaining.swap_remove(idx);
            let mut joined = prev[..prev.len() - 1].to_vec();
            joined.extend_from_slice(&path);
            path = joined;
        } else {
            return None;
        }
    }

    if !path[0].coincides(&path[path.len() - 1]) {
        return None;
    }

    let mut seen: HashSet<i64> = HashSet::default();
    path.retain(|n| match n.id {
        Some(id) => seen.insert(id),
        None => true,
    });
    Some(path)
}
