// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Interactive free-navigation sessions.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::area::End;
use crate::tiles::GeodataTransport;
use crate::{
    turn_angle, Continuation, Error, MapArea, OptionManager, Point, SessionConfig, TileService,
};

mod lookahead;
mod prefs;
mod presentation;

pub use lookahead::{CancellationToken, LookaheadOutcome, LookaheadTask};
pub use prefs::{MemoryPreferences, PreferenceStore, START_KEY};
pub use presentation::{turn_hint, RideOption, PALETTE};

/// Stage of a [RideSession].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No start position has been selected.
    Unstarted,

    /// Start options are offered, but none has been applied.
    Positioned,

    /// A segment is being ridden.
    Navigating,
}

/// Drives free navigation: offers, ranks and applies [Continuations](Continuation),
/// precomputing one level of options ahead.
///
/// Typical usage:
/// 1. [select_start_position](RideSession::select_start_position),
/// 2. [select](RideSession::select) and [apply_selected](RideSession::apply_selected)
///    (or [apply_option](RideSession::apply_option)),
/// 3. [get_next_options](RideSession::get_next_options), spawning the returned
///    [LookaheadTask] on the host's executor, and back to 2.
pub struct RideSession<T: GeodataTransport, P: PreferenceStore> {
    tiles: Rc<TileService<T>>,
    prefs: P,
    config: SessionConfig,
    position: Option<Point>,
    current: Option<Continuation>,
    offered: Rc<RefCell<Vec<Continuation>>>,
    selected: Option<usize>,
    token: CancellationToken,
}

impl<T: GeodataTransport + 'static, P: PreferenceStore> RideSession<T, P> {
    pub fn new(tiles: Rc<TileService<T>>, prefs: P, config: SessionConfig) -> Self {
        Self {
            tiles,
            prefs,
            config,
            position: None,
            current: None,
            offered: Rc::default(),
            selected: None,
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> State {
        match (self.position, &self.current) {
            (None, _) => State::Unstarted,
            (Some(_), None) => State::Positioned,
            (Some(_), Some(_)) => State::Navigating,
        }
    }

    /// Start position of the ride.
    pub fn position(&self) -> Option<Point> {
        self.position
    }

    /// Segment being ridden.
    pub fn current(&self) -> Option<&Continuation> {
        self.current.as_ref()
    }

    /// Currently offered continuations, in order of rank.
    pub fn offered(&self) -> Vec<Continuation> {
        self.offered.borrow().clone()
    }

    /// Index of the tentatively selected offered continuation.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn preferences(&self) -> &P {
        &self.prefs
    }

    /// Starts the ride at the given position, the last persisted start position,
    /// or the configured default (in that order), and returns the options
    /// leaving the nearest way. The used position is persisted.
    pub async fn select_start_position(
        &mut self,
        requested: Option<Point>,
    ) -> Result<Vec<RideOption>, Error> {
        let position = match requested {
            Some(p) if p.is_valid() => p,
            Some(p) => {
                log::warn!("ignoring invalid start position {}", p);
                self.fallback_start()
            }
            None => self.fallback_start(),
        };

        log::info!("starting ride at {}", position);
        prefs::store_start(&mut self.prefs, position)?;
        self.set_offered(Vec::new());
        self.current = None;
        self.position = Some(position);

        let area = self.tiles.try_load(position).await?;
        let nearest = area
            .nearest_path(position)
            .ok_or(Error::NoNearbyWay(position))?;
        let crossing = area
            .locate_crossing(&nearest.way_id, position)
            .ok_or(Error::NoNearbyWay(position))?;
        log::debug!(
            "nearest way is {}, {:.1} m away",
            nearest.way_id,
            nearest.distance
        );

        let mut manager = OptionManager::new(&self.tiles, area.clone());
        let options = manager.get_start_options(&nearest.way_id, &crossing).await;

        let presented = present(&options, Some(&area), false);
        self.selected = (!options.is_empty()).then_some(0);
        self.set_offered(options);
        Ok(presented)
    }

    fn fallback_start(&self) -> Point {
        prefs::load_start(&self.prefs).unwrap_or(self.config.default_start)
    }

    /// Returns the ranked options following the current segment,
    /// tentatively selecting the first one.
    ///
    /// Precomputed options are used if available. The returned task walks
    /// the offered options to precompute the level after them; it should be
    /// spawned on the host's executor (or dropped to skip the lookahead).
    pub async fn get_next_options(&mut self) -> Result<(Vec<RideOption>, LookaheadTask), Error> {
        let current = self.current.as_mut().ok_or(Error::NotStarted)?;

        let options = match current.next.take() {
            Some(next) => {
                log::debug!("using {} precomputed options", next.len());
                next
            }
            None => {
                let tail = current.tail().ok_or(Error::NotStarted)?.pos;
                let area = match current.area.clone() {
                    Some(area) => area,
                    None => self.tiles.try_load(tail).await?,
                };
                let mut manager = OptionManager::new(&self.tiles, area);
                manager.get_next_options(current).await
            }
        };

        let ranked = rank(current, filter_oneway(options));
        let presented = present(&ranked, current.area.as_deref(), true);

        self.selected = (!ranked.is_empty()).then_some(0);
        self.set_offered(ranked);

        let task = LookaheadTask::new(
            self.tiles.clone(),
            self.offered.clone(),
            self.token.clone(),
            self.config.lookahead_hop_limit,
        );
        Ok((presented, task))
    }

    /// Tentatively selects an offered option.
    pub fn select(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.offered.borrow().len() {
            return Err(Error::InvalidOption(index));
        }
        self.selected = Some(index);
        Ok(())
    }

    /// Applies the tentatively selected option.
    pub fn apply_selected(&mut self) -> Result<(), Error> {
        match self.selected {
            Some(index) => self.apply_option(index),
            None if self.position.is_none() => Err(Error::NotStarted),
            None => Err(Error::InvalidOption(0)),
        }
    }

    /// Makes an offered option the current segment.
    pub fn apply_option(&mut self, index: usize) -> Result<(), Error> {
        let option = self
            .offered
            .borrow()
            .get(index)
            .cloned()
            .ok_or(Error::InvalidOption(index))?;
        self.set_current_segment(option);
        Ok(())
    }

    /// Makes the given continuation the current segment, cancelling
    /// any lookahead still running for the previously offered options.
    pub fn set_current_segment(&mut self, segment: Continuation) {
        log::info!(
            "riding {} ({} points)",
            segment.way_id,
            segment.path.len()
        );

        self.token.cancel();
        self.token = CancellationToken::new();
        self.set_offered(Vec::new());
        self.selected = None;
        if self.position.is_none() {
            self.position = segment.head().map(|n| n.pos);
        }
        self.current = Some(segment);
    }

    /// Replaces the offered options. A new list is allocated, so that a lookahead
    /// task of the previous options can't write into it.
    fn set_offered(&mut self, options: Vec<Continuation>) {
        self.offered = Rc::new(RefCell::new(options));
    }
}

/// Removes options entering a one-way way against its direction.
/// If that would remove all options, all are kept.
fn filter_oneway(options: Vec<Continuation>) -> Vec<Continuation> {
    let allowed = |c: &Continuation| {
        !c.reversed
            || !c
                .area
                .as_ref()
                .and_then(|a| a.way(&c.way_id))
                .is_some_and(|w| w.is_oneway())
    };

    if options.is_empty() || options.iter().any(allowed) {
        options.into_iter().filter(allowed).collect()
    } else {
        log::warn!("all {} options violate one-way restrictions, keeping them", options.len());
        options
    }
}

/// Computes heading changes and sorts options: same way first (last when riding
/// a roundabout), then same street name, then by smallest heading change.
fn rank(current: &Continuation, mut options: Vec<Continuation>) -> Vec<Continuation> {
    let area = current.area.as_deref();
    let current_way = area.and_then(|a| a.way(&current.way_id));
    let on_roundabout = current.roundabout || current_way.is_some_and(|w| w.is_roundabout());
    let current_name = current_way.and_then(|w| w.name.as_deref());
    let current_heading = area.and_then(|a| a.heading(&current.way_id, &current.path, End::End));

    for option in options.iter_mut() {
        let option_area = option.area.as_deref().or(area);
        let heading = option_area.and_then(|a| a.heading(&option.way_id, &option.path, End::Start));
        option.heading_delta = match (current_heading, heading) {
            (Some(from), Some(to)) => Some(turn_angle(from, to)),
            _ => None,
        };
    }

    let key = |c: &Continuation| {
        let same_way = c.way_id == current.way_id;
        let way_rank = if same_way != on_roundabout { 0 } else { 1 };

        let name = c
            .area
            .as_deref()
            .or(area)
            .and_then(|a| a.way(&c.way_id))
            .and_then(|w| w.name.as_deref());
        let name_rank = if current_name.is_some() && name == current_name {
            0
        } else {
            1
        };

        (way_rank, name_rank, c.heading_delta.map_or(f64::MAX, f64::abs))
    };

    options.sort_by(|a, b| {
        let (ka, kb) = (key(a), key(b));
        ka.0.cmp(&kb.0)
            .then(ka.1.cmp(&kb.1))
            .then(ka.2.partial_cmp(&kb.2).unwrap_or(Ordering::Equal))
    });
    options
}

fn present(options: &[Continuation], area: Option<&MapArea>, turn_hints: bool) -> Vec<RideOption> {
    options
        .iter()
        .enumerate()
        .map(|(i, c)| RideOption::new(i, c, area, turn_hints))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::tests::ids;
    use crate::tiles::tests::StaticTransport;
    use crate::{Config, WayId};
    use futures_lite::future::block_on;
    use serde_json::json;

    const FIXTURE: &str = include_str!("../osm/test_fixtures/junction.json");

    type Session = RideSession<StaticTransport, MemoryPreferences>;

    fn session_from(json: serde_json::Value) -> Session {
        let config = Config::default();
        let tiles = Rc::new(TileService::new(StaticTransport::new(json), &config));
        RideSession::new(tiles, MemoryPreferences::default(), config.session)
    }

    fn fixture_session() -> Session {
        session_from(serde_json::from_str(FIXTURE).unwrap())
    }

    #[test]
    fn not_started() {
        let mut s = fixture_session();
        assert_eq!(s.state(), State::Unstarted);
        assert!(matches!(block_on(s.get_next_options()), Err(Error::NotStarted)));
        assert!(matches!(s.apply_selected(), Err(Error::NotStarted)));
        assert!(matches!(s.select(0), Err(Error::InvalidOption(0))));
    }

    #[test]
    fn start_position_resolution() {
        let mut s = fixture_session();
        let p = Point::new(50.0005, 20.0001);

        block_on(s.select_start_position(Some(p))).unwrap();
        assert_eq!(s.position(), Some(p));
        assert_eq!(s.state(), State::Positioned);
        assert_eq!(
            s.preferences().get(START_KEY).as_deref(),
            Some(r#"{"lat":50.0005,"lng":20.0001}"#)
        );

        // Without a requested position, the persisted one is used
        block_on(s.select_start_position(None)).unwrap();
        assert_eq!(s.position(), Some(p));
    }

    #[test]
    fn start_at_default_position() {
        let mut s = fixture_session();
        block_on(s.select_start_position(None)).unwrap();
        assert_eq!(s.position(), Some(SessionConfig::default().default_start));
    }

    #[test]
    fn start_without_ways() {
        let mut s = session_from(json!({"elements": []}));
        let p = Point::new(50.0, 20.0);
        assert!(matches!(
            block_on(s.select_start_position(Some(p))),
            Err(Error::NoNearbyWay(_))
        ));
    }

    #[test]
    fn start_with_malformed_map_data() {
        let mut s = session_from(json!({"elements": [{"type": "node"}]}));
        let p = Point::new(50.0, 20.0);
        assert!(matches!(
            block_on(s.select_start_position(Some(p))),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn start_options() {
        let mut s = fixture_session();
        let options = block_on(s.select_start_position(Some(Point::new(50.0005, 20.0001)))).unwrap();

        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "Main Street");
        assert_eq!(options[0].color, PALETTE[0]);
        assert_eq!(options[1].index, 1);
        assert_eq!(s.selected(), Some(0));
    }

    #[test]
    fn ride_through_junction() {
        let mut s = fixture_session();
        block_on(s.select_start_position(Some(Point::new(50.0005, 20.0001)))).unwrap();

        // Ride north on Main Street, to the crossing with Cross Street
        let north = s.offered().iter().position(|c| c.way_id == WayId::from(100) && !c.reversed);
        s.apply_option(north.unwrap()).unwrap();
        assert_eq!(s.state(), State::Navigating);
        assert_eq!(ids(&s.current().unwrap().path), [0, 2]);

        let (options, task) = block_on(s.get_next_options()).unwrap();
        assert_eq!(options.len(), 3);

        // Straight on first, then the turns
        assert_eq!(options[0].label, "Main Street (straight)");
        assert_eq!(ids(&s.offered()[0].path), [2, 3]);
        assert!(options[1].heading_delta.unwrap().abs() > 45.0);
        assert_eq!(block_on(task), LookaheadOutcome::Completed);

        // The lookahead found the dead end at the end of Main Street
        let straight = &s.offered()[0];
        let next = straight.next.as_ref().unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(ids(&next[0].path), [3, 2]);

        s.apply_selected().unwrap();
        let (options, _) = block_on(s.get_next_options()).unwrap();
        assert_eq!(options.len(), 1);
        assert!(options[0].label.ends_with("(turn around)"));
    }

    #[test]
    fn roundabout_exit_priority() {
        let mut s = fixture_session();
        block_on(s.select_start_position(Some(Point::new(50.0010, 20.0020)))).unwrap();

        let area = s.offered()[0].area.clone().unwrap();
        let roundabout = area.ways().find(|w| w.is_roundabout()).unwrap();
        let mut segment = Continuation::new(roundabout.id.clone(), roundabout.path[..3].to_vec());
        segment.roundabout = true;
        segment.area = Some(area.clone());
        s.set_current_segment(segment);

        let (options, _) = block_on(s.get_next_options()).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].way_id, WayId::from(106));
        assert_eq!(options[1].way_id, roundabout.id);
        assert!(options[1].roundabout);
    }

    #[test]
    fn segment_change_cancels_lookahead() {
        let mut s = fixture_session();
        block_on(s.select_start_position(Some(Point::new(50.0005, 20.0001)))).unwrap();
        s.apply_option(1).unwrap();

        let (_, task) = block_on(s.get_next_options()).unwrap();
        s.apply_selected().unwrap();
        assert_eq!(block_on(task), LookaheadOutcome::Cancelled);
        assert!(s.current().unwrap().next.is_none());
    }

    #[test]
    fn oneway_filter_relaxation() {
        let area = Rc::new(crate::area::tests::fixture_area());
        let alley = area.way(&WayId::from(106)).unwrap();

        let mut against = Continuation::new(alley.id.clone(), alley.path.iter().rev().cloned().collect());
        against.reversed = true;
        against.area = Some(area.clone());

        let mut along = Continuation::new(alley.id.clone(), alley.path.clone());
        along.area = Some(area.clone());

        let filtered = filter_oneway(vec![against.clone(), along.clone()]);
        assert_eq!(filtered, [along]);

        let relaxed = filter_oneway(vec![against.clone()]);
        assert_eq!(relaxed, [against]);
    }

    #[test]
    fn backwards_through_into_oneway() {
        // Way 2 is ridden against its order, straight into the one-way way 3
        let mut s = session_from(json!({
            "elements": [
                {"type": "node", "id": 9, "lat": 0.0, "lon": 0.0},
                {"type": "node", "id": 5, "lat": 0.001, "lon": 0.0},
                {"type": "node", "id": 6, "lat": 0.001, "lon": 0.001},
                {"type": "node", "id": 7, "lat": 0.002, "lon": 0.001},
                {"type": "node", "id": 8, "lat": 0.002, "lon": 0.0},
                {"type": "way", "id": 1, "nodes": [9, 5], "tags": {"highway": "residential"}},
                {"type": "way", "id": 2, "nodes": [6, 5], "tags": {"highway": "residential"}},
                {"type": "way", "id": 3, "nodes": [6, 7], "tags": {"highway": "residential", "oneway": "yes"}},
                {"type": "way", "id": 4, "nodes": [5, 8], "tags": {"highway": "residential"}},
            ]
        }));

        let area = block_on(s.tiles.load(Point::new(0.001, 0.0))).unwrap();
        let path = vec![area.node(9).unwrap().as_path_node(), area.node(5).unwrap().as_path_node()];
        let mut segment = Continuation::new(WayId::from(1), path);
        segment.area = Some(area);
        s.set_current_segment(segment);

        let (options, _) = block_on(s.get_next_options()).unwrap();
        assert_eq!(options.len(), 2);

        let offered = s.offered();
        let into_oneway = offered.iter().find(|c| c.way_id == WayId::from(3)).unwrap();
        assert_eq!(ids(&into_oneway.path), [5, 6, 7]);
        assert!(!into_oneway.reversed);
    }

    #[test]
    fn lookahead_stops_at_hop_limit() {
        // A chain of ways 1-5 along nodes 1-6, forking into ways 6 and 7 at node 6
        let mut elements: Vec<serde_json::Value> = (1..=6)
            .map(|id| json!({"type": "node", "id": id, "lat": 0.001 * id as f64, "lon": 0.0}))
            .collect();
        elements.push(json!({"type": "node", "id": 7, "lat": 0.007, "lon": 0.001}));
        elements.push(json!({"type": "node", "id": 8, "lat": 0.007, "lon": -0.001}));
        for id in 1..=5 {
            elements.push(json!({"type": "way", "id": id, "nodes": [id, id + 1], "tags": {"highway": "residential"}}));
        }
        elements.push(json!({"type": "way", "id": 6, "nodes": [6, 7], "tags": {"highway": "residential"}}));
        elements.push(json!({"type": "way", "id": 7, "nodes": [6, 8], "tags": {"highway": "residential"}}));

        let config = Config::default();
        let tiles = Rc::new(TileService::new(
            StaticTransport::new(json!({ "elements": elements })),
            &config,
        ));
        let session_config = SessionConfig {
            lookahead_hop_limit: 1,
            ..config.session
        };
        let mut s = RideSession::new(tiles, MemoryPreferences::default(), session_config);

        let area = block_on(s.tiles.load(Point::new(0.003, 0.0))).unwrap();
        let path = vec![area.node(1).unwrap().as_path_node(), area.node(2).unwrap().as_path_node()];
        let mut segment = Continuation::new(WayId::from(1), path);
        segment.area = Some(area);
        s.set_current_segment(segment);

        let (options, task) = block_on(s.get_next_options()).unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(ids(&s.offered()[0].path), [2, 3, 4]);

        // One hop reaches node 6, but no hops are left to find the fork there
        assert_eq!(block_on(task), LookaheadOutcome::Completed);
        let walked = &s.offered()[0];
        assert_eq!(ids(&walked.path), [2, 3, 4, 5, 6]);
        assert!(walked.next.is_none());

        // The fork is found in the foreground instead
        s.apply_selected().unwrap();
        let (options, _) = block_on(s.get_next_options()).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(ids(&s.offered()[0].path).len(), 2);
    }

    #[test]
    fn invalid_option() {
        let mut s = fixture_session();
        block_on(s.select_start_position(Some(Point::new(50.0005, 20.0001)))).unwrap();
        assert!(matches!(s.select(5), Err(Error::InvalidOption(5))));
        assert!(matches!(s.apply_option(2), Err(Error::InvalidOption(2))));
        assert_eq!(s.state(), State::Positioned);
    }
}
