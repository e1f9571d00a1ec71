// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::time::Duration;

use serde::Deserialize;

use crate::osm::Profile;
use crate::session::PreferenceStore;
use crate::Point;

/// Preference key holding the comma-separated list of excluded way types.
pub const FILTER_KEY: &str = "freeride.filter";

/// Tunables of the engine.
///
/// All fields have defaults, so a partial JSON document may be loaded
/// with [Config::from_json_str]. Durations are given in seconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tiles: TileConfig,
    pub session: SessionConfig,
    pub profile: Profile,
}

impl Config {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Overrides the excluded way types of the profile with
    /// the list stored in the preferences, if any.
    pub fn apply_preferences<P: PreferenceStore + ?Sized>(&mut self, prefs: &P) {
        if let Some(filter) = prefs.get(FILTER_KEY) {
            self.profile.excluded_types = filter
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            log::debug!("excluded way types: {:?}", self.profile.excluded_types);
        }
    }
}

/// Tunables of the [TileService](crate::TileService).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Radius of the first fetched tile, in meters.
    pub initial_radius: f64,

    pub min_radius: f64,
    pub max_radius: f64,

    /// Tiles with fewer ways grow the radius of the next fetch.
    pub min_ways: usize,

    /// Tiles with more ways shrink the radius of the next fetch.
    pub max_ways: usize,

    /// A cached tile is reused only if its query center lies within
    /// this fraction of its fetch radius from the requested location.
    pub reuse_fraction: f64,

    /// Stale tiles are removed only when there are more of them than this.
    pub cache_size: usize,

    /// Tiles unused for this long are stale.
    #[serde(with = "seconds")]
    pub max_age: Duration,

    /// Interval between two sweeps of stale tiles.
    #[serde(with = "seconds")]
    pub gc_interval: Duration,

    /// Timeout passed to the geodata transport.
    #[serde(with = "seconds")]
    pub query_timeout: Duration,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            initial_radius: 750.0,
            min_radius: 100.0,
            max_radius: 5000.0,
            min_ways: 40,
            max_ways: 800,
            reuse_fraction: 0.2,
            cache_size: 5,
            max_age: Duration::from_secs(300),
            gc_interval: Duration::from_secs(300),
            query_timeout: Duration::from_secs(25),
        }
    }
}

/// Tunables of the [RideSession](crate::RideSession).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Start position used if none was given or persisted.
    pub default_start: Point,

    /// Maximum number of single-option hops followed by the lookahead
    /// for a single option.
    pub lookahead_hop_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_start: Point::new(52.2297, 21.0122),
            lookahead_hop_limit: 64,
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryPreferences;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.tiles.initial_radius, 750.0);
        assert_eq!(c.tiles.cache_size, 5);
        assert_eq!(c.tiles.max_age, Duration::from_secs(300));
        assert_eq!(c.session.lookahead_hop_limit, 64);
        assert_eq!(c.profile.name, "bicycle");
    }

    #[test]
    fn from_json_str() {
        let c = Config::from_json_str(
            r#"{
                "tiles": {"initial_radius": 1000, "max_age": 60.5},
                "session": {"default_start": {"lat": 50.0, "lng": 20.0}},
                "profile": {"name": "foot", "excluded_types": ["motorway"]}
            }"#,
        )
        .unwrap();

        assert_eq!(c.tiles.initial_radius, 1000.0);
        assert_eq!(c.tiles.max_age, Duration::from_millis(60_500));
        assert_eq!(c.tiles.min_ways, 40);
        assert_eq!(c.session.default_start, Point::new(50.0, 20.0));
        assert_eq!(c.session.lookahead_hop_limit, 64);
        assert_eq!(c.profile.name, "foot");
        assert_eq!(c.profile.excluded_types, ["motorway"]);
    }

    #[test]
    fn from_json_str_invalid() {
        assert!(Config::from_json_str(r#"{"tiles": {"max_age": -1}}"#).is_err());
        assert!(Config::from_json_str("[]").is_err());
    }

    #[test]
    fn apply_preferences() {
        let mut prefs = MemoryPreferences::default();
        let mut c = Config::default();

        c.apply_preferences(&prefs);
        assert!(c.profile.excluded_types.contains(&"steps".to_string()));

        prefs.set(FILTER_KEY, "footway, path,,steps");
        c.apply_preferences(&prefs);
        assert_eq!(c.profile.excluded_types, ["footway", "path", "steps"]);
    }
}
