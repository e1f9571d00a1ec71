// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use serde::Deserialize;

/// Describes how to interpret OSM ways when building a [MapArea](crate::MapArea).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Human readable name of the profile,
    /// customary the most specific [access tag](https://wiki.openstreetmap.org/wiki/Key:access).
    ///
    /// This value is not used for actual OSM data interpretation,
    /// except when set to "foot", which adds the following logic:
    /// - `oneway` tags are ignored - only `oneway:foot` tags are considered, except on:
    ///    - `highway=footway`,
    ///    - `highway=path`,
    ///    - `highway=steps`,
    ///    - `highway=platform`
    ///    - `public_transport=platform`,
    ///    - `railway=platform`;
    /// - roundabouts are not implicitly one-way.
    pub name: String,

    /// OSM [access tags](https://wiki.openstreetmap.org/wiki/Key:access#Land-based_transportation)
    /// (in order from least to most specific) to consider when checking for road prohibitions.
    ///
    /// Also used to follow mode-specific one-way tags (see [Profile::way_direction]).
    pub access: Vec<String>,

    /// Way types (values of the `highway` tag) which are never loaded, e.g. "footway".
    pub excluded_types: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self::bicycle()
    }
}

impl Profile {
    /// Profile for riding a bicycle.
    pub fn bicycle() -> Self {
        Self {
            name: "bicycle".to_string(),
            access: vec![
                "access".to_string(),
                "vehicle".to_string(),
                "bicycle".to_string(),
            ],
            excluded_types: ["motorway", "motorway_link", "trunk", "trunk_link", "steps"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Profile for walking and running.
    pub fn foot() -> Self {
        Self {
            name: "foot".to_string(),
            access: vec!["access".to_string(), "foot".to_string()],
            excluded_types: ["motorway", "motorway_link", "trunk", "trunk_link"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Checks if ways of the given type should be skipped.
    pub fn is_excluded(&self, kind: &str) -> bool {
        self.excluded_types.iter().any(|t| t == kind)
    }

    /// Checks if the way is usable, by considering the type filter
    /// ([Profile::excluded_types]) and access tags ([Profile::access]).
    pub fn is_allowed(&self, tags: &HashMap<String, String>) -> bool {
        if let Some(kind) = tags.get("highway") {
            if self.is_excluded(kind) {
                return false;
            }
        }

        match self
            .access
            .iter()
            .rev()
            .find_map(|mode| tags.get(mode).map(|v| v.as_str()))
        {
            Some("no") | Some("private") => false,
            _ => true,
        }
    }

    /// Checks if a way is traversable forward (first return value) and
    /// backwards (second return value) by investigating mode-specific and generic one-way tags.
    ///
    /// Motorways and roundabouts (junction=roundabout, junction=circular) are implicitly
    /// one-way, unless the profile is "foot" or a one-way tag says otherwise.
    pub fn way_direction(&self, tags: &HashMap<String, String>) -> (bool, bool) {
        let tag = |key: &str| tags.get(key).map_or("", String::as_str);

        let implied_oneway = !self.is_foot()
            && (matches!(tag("highway"), "motorway" | "motorway_link")
                || matches!(tag("junction"), "roundabout" | "circular"));

        match self.oneway_value(tags) {
            "yes" | "true" | "1" => (true, false),
            "-1" | "reverse" => (false, true),
            "no" => (true, true),
            _ => (true, !implied_oneway),
        }
    }

    /// Returns the value of the most specific `oneway:<mode>` tag, falling back
    /// to the generic `oneway` tag. Returns an empty string if no tag applies.
    fn oneway_value<'t>(&self, tags: &'t HashMap<String, String>) -> &'t str {
        let value = if self.is_foot() {
            tags.get("oneway:foot").or_else(|| {
                generic_oneway_applies_on_foot(tags)
                    .then(|| tags.get("oneway"))
                    .flatten()
            })
        } else {
            self.access
                .iter()
                .rev()
                .filter(|mode| mode.as_str() != "access")
                .find_map(|mode| tags.get(&format!("oneway:{}", mode)))
                .or_else(|| tags.get("oneway"))
        };

        value.map_or("", String::as_str)
    }

    fn is_foot(&self) -> bool {
        self.name == "foot"
    }
}

/// On foot, the generic `oneway` tag applies only to pedestrian ways and platforms.
fn generic_oneway_applies_on_foot(tags: &HashMap<String, String>) -> bool {
    let tag = |key: &str| tags.get(key).map(String::as_str);

    matches!(tag("highway"), Some("footway" | "path" | "steps" | "platform"))
        || tag("public_transport") == Some("platform")
        || tag("railway") == Some("platform")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_profile() -> Profile {
        Profile {
            name: "cat".to_string(),
            access: vec!["access".to_string(), "cat".to_string()],
            excluded_types: vec!["motorway".to_string()],
        }
    }

    macro_rules! tags {
        {} => { HashMap::default() };
        {$( $k:literal : $v:literal ),+} => {
            HashMap::from_iter([ $( ($k.to_string(), $v.to_string()) ),+ ])
        };
    }

    #[test]
    fn is_allowed() {
        let p = test_profile();
        assert!(p.is_allowed(&tags! {"highway": "footway"}));
        assert!(!p.is_allowed(&tags! {"highway": "motorway"}));
        assert!(!p.is_allowed(&tags! {"highway": "footway", "access": "no"}));
        assert!(!p.is_allowed(&tags! {"highway": "footway", "access": "private"}));
        assert!(p.is_allowed(&tags! {"highway": "footway", "access": "destination"}));
        assert!(p.is_allowed(&tags! {"highway": "footway", "access": "no", "cat": "yes"}));
    }

    #[test]
    fn way_direction() {
        let p = test_profile();
        assert_eq!(p.way_direction(&tags! {"highway": "path"}), (true, true));
        assert_eq!(
            p.way_direction(&tags! {"highway": "path", "oneway": "yes"}),
            (true, false),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "path", "oneway": "-1"}),
            (false, true),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "path", "oneway": "yes", "oneway:cat": "no"}),
            (true, true),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "path", "junction": "roundabout"}),
            (true, false),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "motorway_link", "oneway": "no"}),
            (true, true),
        );
        assert_eq!(
            p.way_direction(&tags! {"junction": "circular", "oneway": "-1"}),
            (false, true),
        );
    }

    #[test]
    fn way_direction_bicycle() {
        let p = Profile::bicycle();
        assert_eq!(
            p.way_direction(&tags! {"highway": "residential", "oneway": "yes", "oneway:bicycle": "no"}),
            (true, true),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "residential", "oneway": "yes"}),
            (true, false),
        );
    }

    #[test]
    fn way_direction_foot() {
        let p = Profile::foot();
        assert_eq!(
            p.way_direction(&tags! {"highway": "residential", "oneway": "yes"}),
            (true, true),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "residential", "oneway:foot": "yes"}),
            (true, false),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "residential", "junction": "roundabout"}),
            (true, true),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "path", "oneway": "yes"}),
            (true, false),
        );
        assert_eq!(
            p.way_direction(&tags! {"highway": "footway", "oneway": "-1"}),
            (false, true),
        );
    }
}
