// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! On-demand loading and caching of [MapAreas](MapArea).

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use crate::distance::DISTANCE_TOLERANCE;
use crate::osm::{self, Profile};
use crate::{earth_distance, BoundingBox, Error, MapArea, Point, TileConfig};

mod transport;

pub use transport::{read_json, FileFormat, FileTransport, GeodataTransport};

/// A cached tile, keyed by the location it was fetched for.
#[derive(Debug)]
struct Record {
    key: String,
    area: Rc<MapArea>,

    /// Radius used to fetch the tile, in meters.
    radius: f64,

    last_used: Cell<Instant>,
}

/// Fetches [MapAreas](MapArea) on demand through a [GeodataTransport]
/// and caches them.
///
/// The service is meant to be shared (through an [Rc]) by all components
/// of a single-threaded host. All methods take `&self`; no borrow of the cache
/// is held across a fetch.
#[derive(Debug)]
pub struct TileService<T: GeodataTransport> {
    transport: T,
    config: TileConfig,
    profile: Profile,
    cache: RefCell<Vec<Record>>,
    newest: RefCell<Option<String>>,
    radius: Cell<f64>,

    /// Time of the last sweep of stale tiles, `None` before the first fetch.
    last_sweep: Cell<Option<Instant>>,
}

impl<T: GeodataTransport> TileService<T> {
    pub fn new(transport: T, config: &crate::Config) -> Self {
        Self {
            transport,
            profile: config.profile.clone(),
            radius: Cell::new(config.tiles.initial_radius),
            config: config.tiles.clone(),
            cache: RefCell::default(),
            newest: RefCell::default(),
            last_sweep: Cell::default(),
        }
    }

    /// Radius which will be used for the next fetch, in meters.
    pub fn radius(&self) -> f64 {
        self.radius.get()
    }

    /// Number of cached tiles.
    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Returns a tile for the given location.
    ///
    /// A cached tile is reused if it covers the location and the location lies
    /// close to the center of the tile (within [TileConfig::reuse_fraction]
    /// of its fetch radius). Otherwise a new tile is fetched.
    ///
    /// Returns `None` if the fetch failed or its result could not be parsed.
    /// Use [TileService::try_load] to learn why.
    pub async fn load(&self, location: Point) -> Option<Rc<MapArea>> {
        match self.try_load(location).await {
            Ok(area) => Some(area),
            Err(e) => {
                log::error!("failed to load tile around {}: {}", location, e);
                None
            }
        }
    }

    /// Same as [TileService::load], but reports why no tile could be loaded:
    /// [Error::NoArea] if the transport gave no result and [Error::Parse]
    /// if the result was malformed.
    pub async fn try_load(&self, location: Point) -> Result<Rc<MapArea>, Error> {
        let now = Instant::now();
        self.sweep_if_due(now);

        if let Some(area) = self.find_cached(location, now) {
            log::debug!("reusing tile around {} for {}", area.center(), location);
            return Ok(area);
        }

        self.fetch(location).await
    }

    fn find_cached(&self, location: Point, now: Instant) -> Option<Rc<MapArea>> {
        let cache = self.cache.borrow();
        let record = cache.iter().filter(|r| r.area.contains(location)).find(|r| {
            earth_distance(r.area.center(), location)
                <= self.config.reuse_fraction * r.radius + DISTANCE_TOLERANCE
        })?;

        record.last_used.set(now);
        Some(record.area.clone())
    }

    async fn fetch(&self, location: Point) -> Result<Rc<MapArea>, Error> {
        let radius = self.radius.get();
        let bbox = BoundingBox::around(location, radius);
        let query = osm::query::build(&bbox, &self.profile, self.config.query_timeout);

        log::info!("fetching tile around {} with radius {:.0} m", location, radius);
        let json = self
            .transport
            .query(&query, Some(self.config.query_timeout))
            .await
            .ok_or(Error::NoArea(location))?;
        let data = osm::parse(&json, &self.profile)?;

        let area = Rc::new(MapArea::new(data, location, bbox));
        self.tune_radius(area.way_count());

        let now = Instant::now();
        let key = location.to_string();
        {
            let mut cache = self.cache.borrow_mut();
            cache.retain(|r| r.key != key);
            cache.push(Record {
                key: key.clone(),
                area: area.clone(),
                radius,
                last_used: Cell::new(now),
            });
        }
        *self.newest.borrow_mut() = Some(key);

        if self.last_sweep.get().is_none() {
            self.last_sweep.set(Some(now));
        }

        Ok(area)
    }

    /// Adjusts the radius of the next fetch based on the number of ways in the last tile.
    fn tune_radius(&self, way_count: usize) {
        let current = self.radius.get();
        let c = &self.config;

        let next = if way_count == 0 {
            current * 2.0
        } else if way_count < c.min_ways {
            current * (c.min_ways as f64 / way_count as f64).sqrt()
        } else if way_count > c.max_ways {
            current * (c.max_ways as f64 / way_count as f64).sqrt()
        } else {
            current
        };
        let next = next.clamp(c.min_radius, c.max_radius);

        if next != current {
            log::debug!(
                "tile had {} ways, changing radius from {:.0} m to {:.0} m",
                way_count,
                current,
                next
            );
            self.radius.set(next);
        }
    }

    fn sweep_if_due(&self, now: Instant) {
        if let Some(last) = self.last_sweep.get() {
            if now.saturating_duration_since(last) >= self.config.gc_interval {
                self.collect_garbage(now);
                self.last_sweep.set(Some(now));
            }
        }
    }

    /// Removes stale tiles (unused for at least [TileConfig::max_age]),
    /// but only if there are more of them than [TileConfig::cache_size].
    /// The most recently fetched tile is never removed.
    ///
    /// Returns the number of removed tiles.
    pub fn collect_garbage(&self, now: Instant) -> usize {
        let newest = self.newest.borrow();
        let is_stale = |r: &Record| {
            Some(&r.key) != newest.as_ref()
                && now.saturating_duration_since(r.last_used.get()) >= self.config.max_age
        };

        let mut cache = self.cache.borrow_mut();
        let stale = cache.iter().filter(|r| is_stale(r)).count();
        if stale <= self.config.cache_size {
            return 0;
        }

        cache.retain(|r| !is_stale(r));
        log::debug!("removed {} stale tiles, {} left", stale, cache.len());
        stale
    }
}
