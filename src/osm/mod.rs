// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Interpretation of [OpenStreetMap](https://www.openstreetmap.org/) data
//! as returned by an [Overpass API](https://wiki.openstreetmap.org/wiki/Overpass_API) server.

mod profile;
pub mod query;
mod reader;

pub use profile::Profile;
pub use reader::{parse, AreaData};
