// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::{Continuation, MapArea, Point, WayId};

/// Colors of presented options, by rank.
pub const PALETTE: [&str; 6] = [
    "#1e88e5", "#43a047", "#fb8c00", "#8e24aa", "#e53935", "#00897b",
];

/// A [Continuation] prepared for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct RideOption {
    /// Rank of the option, and the index to pass to
    /// [RideSession::select](super::RideSession::select).
    pub index: usize,

    pub way_id: WayId,
    pub label: String,
    pub color: &'static str,
    pub path: Vec<Point>,
    pub heading_delta: Option<f64>,
    pub roundabout: bool,
}

impl RideOption {
    pub(super) fn new(
        index: usize,
        option: &Continuation,
        area: Option<&MapArea>,
        with_turn_hint: bool,
    ) -> Self {
        let name = option
            .area
            .as_deref()
            .or(area)
            .and_then(|a| a.way(&option.way_id))
            .map(|w| w.display_name())
            .unwrap_or_else(|| option.way_id.to_string());

        let label = match (with_turn_hint, option.heading_delta) {
            (true, Some(delta)) => format!("{} ({})", name, turn_hint(delta)),
            _ => name,
        };

        Self {
            index,
            way_id: option.way_id.clone(),
            label,
            color: PALETTE[index % PALETTE.len()],
            path: option.path.iter().map(|n| n.pos).collect(),
            heading_delta: option.heading_delta,
            roundabout: option.roundabout,
        }
    }
}

/// Describes a signed heading change (positive to the right) in words.
pub fn turn_hint(delta: f64) -> &'static str {
    let side_right = delta > 0.0;
    match delta.abs() {
        a if a < 15.0 => "straight",
        a if a < 45.0 => pick(side_right, "slight right", "slight left"),
        a if a < 120.0 => pick(side_right, "right", "left"),
        a if a < 170.0 => pick(side_right, "sharp right", "sharp left"),
        _ => "turn around",
    }
}

fn pick(right: bool, r: &'static str, l: &'static str) -> &'static str {
    if right {
        r
    } else {
        l
    }
}
