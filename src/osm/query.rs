// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::time::Duration;

use crate::osm::Profile;
use crate::BoundingBox;

/// Builds an [Overpass QL](https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL)
/// query for all `highway` ways (except [excluded types](Profile::excluded_types))
/// within the bounding box, together with their nodes.
pub fn build(bbox: &BoundingBox, profile: &Profile, timeout: Duration) -> String {
    let exclusion = if profile.excluded_types.is_empty() {
        String::new()
    } else {
        format!("[\"highway\"!~\"^({})$\"]", profile.excluded_types.join("|"))
    };

    format!(
        "[out:json][timeout:{}];\n\
         (\n  way[\"highway\"]{}({:.7},{:.7},{:.7},{:.7});\n);\n\
         (._;>;);\n\
         out body;",
        timeout.as_secs().max(1),
        exclusion,
        bbox.south,
        bbox.west,
        bbox.north,
        bbox.east,
    )
}
