// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::Point;

/// Error conditions which may occur when interpreting a geodata query result.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The result does not follow the Overpass JSON layout.
    #[error("malformed query result: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Error conditions which may occur when navigating.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// No map data could be loaded around the position.
    #[error("no map data available around {0}")]
    NoArea(Point),

    /// The loaded map data contains no way close to the position.
    #[error("no way near {0}")]
    NoNearbyWay(Point),

    /// The session has no start position or current segment yet.
    #[error("ride session has not been started")]
    NotStarted,

    /// The selected option does not exist.
    #[error("invalid option: {0}")]
    InvalidOption(usize),
}
