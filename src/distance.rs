// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::Point;

/// Mean radius of Earth, in meters.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
pub(crate) const EARTH_RADIUS: f64 = 6_371_008.8;

/// Mean diameter of Earth, in meters.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
const EARTH_DIAMETER: f64 = EARTH_RADIUS + EARTH_RADIUS;

/// Distance (in meters) below which two points are considered to be the same place.
pub const SNAP_DISTANCE: f64 = 5.0;

/// Round-off allowance (in meters) for distance comparisons against exact thresholds.
pub(crate) const DISTANCE_TOLERANCE: f64 = 1e-6;

/// Calculates the great-circle distance between two lat-lon positions
/// on Earth using the `haversine formula <https://en.wikipedia.org/wiki/Haversine_formula>`_.
/// Returns the result in meters.
pub fn earth_distance(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lon1 = a.lng.to_radians();
    let lat2 = b.lat.to_radians();
    let lon2 = b.lng.to_radians();

    let sin_dlat_half = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1) * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half;

    EARTH_DIAMETER * h.sqrt().min(1.0).asin()
}

/// Checks if two points are within [SNAP_DISTANCE] of each other.
pub fn same_point(a: Point, b: Point) -> bool {
    earth_distance(a, b) <= SNAP_DISTANCE
}

/// Calculates the initial bearing (forward azimuth) when travelling from `a` to `b`,
/// in degrees clockwise from north, normalized to `[0, 360)`.
pub fn bearing(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lng - a.lng).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Returns the point reached after travelling `distance` meters from `p`
/// along a great circle with the given initial `bearing` (in degrees).
pub fn destination_point(p: Point, distance: f64, bearing: f64) -> Point {
    let lat1 = p.lat.to_radians();
    let lon1 = p.lng.to_radians();
    let d = distance / EARTH_RADIUS;
    let theta = bearing.to_radians();

    let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * theta.cos()).asin();
    let lon2 = lon1 + (theta.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());

    Point {
        lat: lat2.to_degrees(),
        lng: (lon2.to_degrees() + 540.0) % 360.0 - 180.0,
    }
}

/// Signed difference between two bearings, in degrees, normalized to `(-180, 180]`.
/// Positive values denote a clockwise (right) turn.
pub fn turn_angle(from: f64, to: f64) -> f64 {
    let d = (to - from) % 360.0;
    if d > 180.0 {
        d - 360.0
    } else if d <= -180.0 {
        d + 360.0
    } else {
        d
    }
}

/// Axis-aligned geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Smallest box containing a circle of `radius` meters around `center`.
    pub fn around(center: Point, radius: f64) -> Self {
        let north = destination_point(center, radius, 0.0);
        let east = destination_point(center, radius, 90.0);
        let south = destination_point(center, radius, 180.0);
        let west = destination_point(center, radius, 270.0);
        Self {
            south: south.lat,
            west: west.lng,
            north: north.lat,
            east: east.lng,
        }
    }

    /// Box containing exactly one point.
    pub fn from_point(p: Point) -> Self {
        Self {
            south: p.lat,
            west: p.lng,
            north: p.lat,
            east: p.lng,
        }
    }

    /// Smallest box containing all provided points, or `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bbox = Self::from_point(first);
        points.for_each(|p| bbox.extend(p));
        Some(bbox)
    }

    pub fn extend(&mut self, p: Point) {
        self.south = self.south.min(p.lat);
        self.west = self.west.min(p.lng);
        self.north = self.north.max(p.lat);
        self.east = self.east.max(p.lng);
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }

    pub fn center(&self) -> Point {
        Point {
            lat: (self.south + self.north) * 0.5,
            lng: (self.west + self.east) * 0.5,
        }
    }
}
