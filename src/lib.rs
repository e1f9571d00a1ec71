// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Free-navigation over [OpenStreetMap](https://www.openstreetmap.org/) road graphs.
//!
//! Instead of answering "what is the best route to X", freeride answers
//! "where can I go from here". Local road graphs ([MapArea]) are fetched on demand
//! from an Overpass-like [geodata service](tiles::GeodataTransport), cached by the
//! [TileService], and normalized (roundabouts split over multiple ways are merged).
//! At each decision point the [OptionManager] enumerates legal [Continuations](Continuation),
//! honoring one-way streets and roundabouts, and a [RideSession] ranks and labels them,
//! precomputing one level of lookahead in the background.
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! let config = freeride::Config::default();
//! let transport = freeride::tiles::FileTransport::new("path/to/dump.json");
//! let tiles = Rc::new(freeride::TileService::new(transport, &config));
//! let mut session = freeride::RideSession::new(
//!     tiles,
//!     freeride::session::MemoryPreferences::default(),
//!     config.session.clone(),
//! );
//!
//! futures_lite::future::block_on(async {
//!     let start = freeride::Point::new(43.7384, 7.4246);
//!     let options = session.select_start_position(Some(start)).await.unwrap();
//!     for option in &options {
//!         println!("{}: {}", option.index, option.label);
//!     }
//! });
//! ```

use serde::{Deserialize, Serialize};

pub mod area;
pub mod config;
mod distance;
mod error;
mod geometry;
mod model;
pub mod options;
pub mod osm;
pub mod session;
pub mod tiles;

pub use area::MapArea;
pub use config::{Config, SessionConfig, TileConfig};
pub use distance::{
    bearing, destination_point, earth_distance, same_point, turn_angle, BoundingBox,
    SNAP_DISTANCE,
};
pub use error::{Error, ParseError};
pub use geometry::{
    nearest_on_polyline, perpendicular_crossing, point_to_polyline_distance, Crossing,
    PolylineMatch,
};
pub use model::{Direction, Node, Way, WayId};
pub use options::{remove_duplicates, Continuation, OptionManager};
pub use session::RideSession;
pub use tiles::TileService;

/// Geographic position, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns true if both coordinates are finite and within their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

/// Represents a single point of a [Way] path or a [Continuation] path.
///
/// Points with `id == None` are transient: they are interpolated crossing points,
/// which never exist in the node lookup of a [MapArea].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathNode {
    pub id: Option<i64>,
    pub pos: Point,
}

impl PathNode {
    pub const fn new(id: i64, pos: Point) -> Self {
        Self { id: Some(id), pos }
    }

    pub const fn transient(pos: Point) -> Self {
        Self { id: None, pos }
    }

    pub fn is_transient(&self) -> bool {
        self.id.is_none()
    }

    /// Checks if two path nodes refer to the same place: either by sharing an id,
    /// or (if any of them is transient) by being within [SNAP_DISTANCE] of each other.
    pub fn coincides(&self, other: &PathNode) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => same_point(self.pos, other.pos),
        }
    }
}
