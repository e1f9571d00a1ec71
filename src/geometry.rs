// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::distance::EARTH_RADIUS;
use crate::{bearing, earth_distance, turn_angle, PathNode, Point};

/// Maximum angle (in degrees) between a segment and the direction towards a point
/// for the point to be considered for a perpendicular projection onto that segment.
const PROJECTION_GATE: f64 = 30.0;

/// Segments shorter than this (squared, in meters²) are considered degenerate.
const MIN_SEGMENT_LENGTH_SQ: f64 = 1e-6;

/// Foot of the perpendicular dropped from a point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    /// Position of the perpendicular foot.
    pub pos: Point,

    /// Distance (in meters) from the original point to [Crossing::pos].
    pub distance: f64,

    /// Position of the foot along the segment: 0 at its start, 1 at its end.
    /// Values outside of `[0, 1]` denote a foot lying on the segment's extension.
    pub fraction: f64,
}

/// Nearest place on a polyline to some point, as returned by [nearest_on_polyline].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineMatch {
    /// Distance (in meters) to the polyline.
    pub distance: f64,

    /// Index of the first node of the segment containing [PolylineMatch::pos].
    pub index: usize,

    /// Index of the path node at [PolylineMatch::pos], or `None` if the nearest
    /// place was interpolated between `path[index]` and `path[index + 1]`.
    pub vertex: Option<usize>,

    /// The nearest place on the polyline.
    pub pos: Point,
}

/// Constructs the line perpendicular to segment `a`-`b` passing through `p`
/// and returns the point where it crosses the segment's line.
///
/// Uses a local equirectangular projection around `a`, which is accurate
/// for segments of road-network scale. Returns `None` for degenerate input:
/// invalid coordinates or a zero-length segment.
pub fn perpendicular_crossing(p: Point, a: Point, b: Point) -> Option<Crossing> {
    if !p.is_valid() || !a.is_valid() || !b.is_valid() {
        return None;
    }

    let cos_lat = a.lat.to_radians().cos();
    let project = |q: Point| -> (f64, f64) {
        let dlng = wrap_longitude(q.lng - a.lng);
        (
            dlng.to_radians() * cos_lat * EARTH_RADIUS,
            (q.lat - a.lat).to_radians() * EARTH_RADIUS,
        )
    };

    let (bx, by) = project(b);
    let (px, py) = project(p);
    let len_sq = bx * bx + by * by;
    if len_sq < MIN_SEGMENT_LENGTH_SQ {
        return None;
    }

    let fraction = (px * bx + py * by) / len_sq;
    let pos = Point {
        lat: a.lat + fraction * (b.lat - a.lat),
        lng: wrap_longitude(a.lng + fraction * wrap_longitude(b.lng - a.lng)),
    };

    Some(Crossing {
        pos,
        distance: earth_distance(p, pos),
        fraction,
    })
}

/// Finds the nearest place on a polyline to the given point.
///
/// For every segment whose direction roughly points towards `p` (from either end),
/// the perpendicular foot is used if it falls strictly between the segment's ends.
/// Otherwise, the distance to the nearest vertex is used. A point exactly equal
/// to a vertex short-circuits to distance zero.
///
/// Returns `None` if the path is empty or the point is malformed.
pub fn nearest_on_polyline(p: Point, path: &[PathNode]) -> Option<PolylineMatch> {
    if path.is_empty() || !p.is_valid() {
        return None;
    }

    let last_segment = path.len().saturating_sub(2);

    if let Some(idx) = path.iter().position(|n| n.pos == p) {
        return Some(PolylineMatch {
            distance: 0.0,
            index: idx.min(last_segment),
            vertex: Some(idx),
            pos: p,
        });
    }

    let mut best = path
        .iter()
        .enumerate()
        .map(|(idx, n)| (idx, earth_distance(p, n.pos)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, distance)| PolylineMatch {
            distance,
            index: idx.min(last_segment),
            vertex: Some(idx),
            pos: path[idx].pos,
        })?;

    for (idx, pair) in path.windows(2).enumerate() {
        let (a, b) = (pair[0].pos, pair[1].pos);
        if !passes_projection_gate(p, a, b) {
            continue;
        }

        if let Some(c) = perpendicular_crossing(p, a, b) {
            if c.fraction > 0.0 && c.fraction < 1.0 && c.distance < best.distance {
                best = PolylineMatch {
                    distance: c.distance,
                    index: idx,
                    vertex: None,
                    pos: c.pos,
                };
            }
        }
    }

    Some(best)
}

/// Calculates the distance (in meters) between a point and a polyline,
/// see [nearest_on_polyline].
pub fn point_to_polyline_distance(p: Point, path: &[PathNode]) -> Option<f64> {
    nearest_on_polyline(p, path).map(|m| m.distance)
}

fn passes_projection_gate(p: Point, a: Point, b: Point) -> bool {
    let at_start = turn_angle(bearing(a, b), bearing(a, p)).abs();
    let at_end = turn_angle(bearing(b, a), bearing(b, p)).abs();
    at_start <= PROJECTION_GATE || at_end <= PROJECTION_GATE
}

fn wrap_longitude(lng: f64) -> f64 {
    if lng > 180.0 {
        lng - 360.0
    } else if lng < -180.0 {
        lng + 360.0
    } else {
        lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination_point;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr, $eps:expr) => {
            assert!(
                (($a - $b).abs() < $eps),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    fn path(points: &[(f64, f64)]) -> Vec<PathNode> {
        points
            .iter()
            .enumerate()
            .map(|(idx, &(lat, lng))| PathNode::new(idx as i64 + 1, Point::new(lat, lng)))
            .collect()
    }

    #[test]
    fn crossing_inside_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 0.002);
        let p = Point::new(0.0001, 0.001);

        let c = perpendicular_crossing(p, a, b).unwrap();
        assert_almost_eq!(c.fraction, 0.5, 1e-9);
        assert_almost_eq!(c.pos.lat, 0.0, 1e-12);
        assert_almost_eq!(c.pos.lng, 0.001, 1e-12);
        assert_almost_eq!(c.distance, 11.12, 0.01);
    }

    #[test]
    fn crossing_outside_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 0.002);
        let c = perpendicular_crossing(Point::new(0.0001, 0.003), a, b).unwrap();
        assert!(c.fraction > 1.0);
    }

    #[test]
    fn crossing_degenerate() {
        let a = Point::new(0.0, 0.0);
        assert_eq!(perpendicular_crossing(Point::new(0.001, 0.0), a, a), None);
        assert_eq!(
            perpendicular_crossing(Point::new(f64::NAN, 0.0), a, Point::new(0.0, 0.001)),
            None
        );
    }

    #[test]
    fn polyline_distance_perpendicular() {
        let p = path(&[(0.0, 0.0), (0.0, 0.002), (0.002, 0.002)]);
        let m = nearest_on_polyline(Point::new(0.0001, 0.001), &p).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.vertex, None);
        assert_almost_eq!(m.distance, 11.12, 0.01);
    }

    #[test]
    fn polyline_distance_vertex_fallback() {
        let p = path(&[(0.0, 0.0), (0.0, 0.002)]);
        let beyond = Point::new(0.0, 0.003);
        let m = nearest_on_polyline(beyond, &p).unwrap();
        assert_eq!(m.vertex, Some(1));
        assert_eq!(m.index, 0);
        assert_almost_eq!(m.distance, earth_distance(beyond, p[1].pos), 1e-9);
    }

    #[test]
    fn polyline_distance_exact_vertex() {
        let p = path(&[(0.0, 0.0), (0.0, 0.002), (0.002, 0.002)]);
        let m = nearest_on_polyline(Point::new(0.0, 0.002), &p).unwrap();
        assert_eq!(m.distance, 0.0);
        assert_eq!(m.vertex, Some(1));
        assert_eq!(m.index, 1);
    }

    #[test]
    fn polyline_distance_degenerate() {
        assert_eq!(point_to_polyline_distance(Point::new(0.0, 0.0), &[]), None);
        let p = path(&[(0.0, 0.0), (0.0, 0.002)]);
        assert_eq!(point_to_polyline_distance(Point::new(91.0, 0.0), &p), None);

        let single = path(&[(0.0, 0.0)]);
        let d = point_to_polyline_distance(Point::new(0.001, 0.0), &single).unwrap();
        assert_almost_eq!(d, 111.2, 0.1);
    }

    #[test]
    fn polyline_distance_symmetric_to_segment_direction() {
        let start = Point::new(10.0, 10.0);
        let end = destination_point(start, 400.0, 45.0);
        let mid = destination_point(start, 200.0, 45.0);
        let off = destination_point(mid, 20.0, 135.0);

        let forward = path(&[(start.lat, start.lng), (end.lat, end.lng)]);
        let backward = path(&[(end.lat, end.lng), (start.lat, start.lng)]);

        let d1 = point_to_polyline_distance(off, &forward).unwrap();
        let d2 = point_to_polyline_distance(off, &backward).unwrap();
        assert_almost_eq!(d1, 20.0, 0.05);
        assert_almost_eq!(d1, d2, 0.01);
    }
}
