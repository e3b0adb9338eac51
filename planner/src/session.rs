//! Route-session state machine.
//!
//! A session turns map clicks into routing requests and routing results into
//! the info panel. It performs no I/O: transitions hand out tickets, the
//! caller runs the request and reports back with the ticket id. A result
//! whose ticket is no longer the active one is dropped, so a slow response can
//! never overwrite a newer route.

use shared::{
    ClickMode, Coordinate, ElevationSection, ElevationStats, InfoPanel, ItineraryStep, MapClick,
    RouteResult, ScreenRect, SessionState, SessionView, Units,
};
use uuid::Uuid;

use crate::chart::ElevationCanvas;
use crate::elevation::{
    downsample, elevation_stats, show_max_grade, ELEVATION_FAILURE_MESSAGE, MAX_ELEVATION_SAMPLES,
};
use crate::error::PlannerError;
use crate::format::{format_distance, format_duration, format_elevation, format_grade};

pub const STATUS_IDLE: &str = "Click on the map to pick a first point.";
pub const STATUS_PICK_DESTINATION: &str = "Now pick a destination.";
pub const STATUS_PICK_SECOND: &str = "Pick a second point.";
pub const STATUS_PENDING: &str = "Searching for a route...";
pub const STATUS_FOUND: &str = "Route found.";
pub const STATUS_NOT_FOUND: &str = "Cannot find a route between these points.";
pub const STATUS_SAME_POINT: &str = "Pick a different endpoint.";

const SHORT_RIDE_M: f64 = 10_000.0;
const HALF_DAY_RIDE_M: f64 = 50_000.0;
const FLAT_GRADE_PCT: f64 = 1.0;
const ROLLING_GRADE_PCT: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteTicket {
    pub id: u64,
    pub waypoints: Vec<Coordinate>,
}

impl RouteTicket {
    pub fn destination(&self) -> Option<Coordinate> {
        self.waypoints.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElevationTicket {
    pub route_id: u64,
    pub points: Vec<Coordinate>,
    pub total_distance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Click landed on the info panel.
    Ignored,
    /// Endpoint equals the point it would connect to.
    Rejected,
    /// Waypoint recorded, not enough points for a route yet.
    Collecting,
    Request(RouteTicket),
}

#[derive(Debug)]
struct ActiveRoute {
    ticket: u64,
    route: RouteResult,
    destination_label: String,
}

#[derive(Debug)]
enum Elevation {
    Empty,
    Stale,
    Loading,
    Loaded(ElevationStats),
    Failed,
}

#[derive(Debug)]
pub struct RouteSession {
    id: Uuid,
    mode: ClickMode,
    units: Units,
    elevation_cap: usize,
    state: SessionState,
    status: String,
    waypoints: Vec<Coordinate>,
    next_ticket: u64,
    in_flight: Option<u64>,
    current: Option<ActiveRoute>,
    panel_expanded: bool,
    panel_bounds: Option<ScreenRect>,
    elevation: Elevation,
    canvas: ElevationCanvas,
    map_center: Option<Coordinate>,
}

impl RouteSession {
    pub fn new(id: Uuid, mode: ClickMode, units: Units) -> Self {
        Self {
            id,
            mode,
            units,
            elevation_cap: MAX_ELEVATION_SAMPLES,
            state: SessionState::Idle,
            status: STATUS_IDLE.to_string(),
            waypoints: Vec::new(),
            next_ticket: 0,
            in_flight: None,
            current: None,
            panel_expanded: false,
            panel_bounds: None,
            elevation: Elevation::Empty,
            canvas: ElevationCanvas::default(),
            map_center: None,
        }
    }

    pub fn with_elevation_cap(mut self, cap: usize) -> Self {
        self.elevation_cap = cap;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn waypoints(&self) -> &[Coordinate] {
        &self.waypoints
    }

    pub fn route(&self) -> Option<&RouteResult> {
        self.current.as_ref().map(|active| &active.route)
    }

    pub fn destination_label(&self) -> Option<&str> {
        self.current
            .as_ref()
            .map(|active| active.destination_label.as_str())
    }

    pub fn map_interactions_enabled(&self) -> bool {
        !self.panel_expanded
    }

    /// Whether a routing result for `ticket` would still be applied.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.in_flight == Some(ticket)
    }

    pub fn click(&mut self, click: MapClick) -> ClickOutcome {
        if self.hits_panel(&click) {
            tracing::debug!(session = %self.id, "click inside the info panel ignored");
            return ClickOutcome::Ignored;
        }

        let point = click.coordinate;
        match self.state {
            SessionState::Idle | SessionState::Failed => {
                self.start_over(point);
                ClickOutcome::Collecting
            }
            SessionState::Collecting | SessionState::Pending | SessionState::Resolved => {
                let Some(anchor) = self.anchor() else {
                    self.start_over(point);
                    return ClickOutcome::Collecting;
                };
                if anchor.same_position(&point) {
                    self.status = STATUS_SAME_POINT.to_string();
                    return ClickOutcome::Rejected;
                }
                match self.mode {
                    ClickMode::SingleDestination => self.waypoints = vec![anchor, point],
                    ClickMode::MultiWaypoint => self.waypoints.push(point),
                }
                ClickOutcome::Request(self.issue_ticket())
            }
        }
    }

    /// Move an existing waypoint and re-route when there is something to route.
    pub fn drag_waypoint(
        &mut self,
        index: usize,
        coordinate: Coordinate,
    ) -> Result<ClickOutcome, PlannerError> {
        let len = self.waypoints.len();
        if index >= len {
            return Err(PlannerError::WaypointIndex { index, len });
        }

        let collides = |neighbour: Option<&Coordinate>| {
            neighbour.is_some_and(|other| other.same_position(&coordinate))
        };
        let previous = index.checked_sub(1).and_then(|idx| self.waypoints.get(idx));
        if collides(previous) || collides(self.waypoints.get(index + 1)) {
            self.status = STATUS_SAME_POINT.to_string();
            return Ok(ClickOutcome::Rejected);
        }

        self.waypoints[index] = coordinate;
        if self.waypoints.len() >= 2 {
            Ok(ClickOutcome::Request(self.issue_ticket()))
        } else {
            Ok(ClickOutcome::Collecting)
        }
    }

    /// Apply a successful routing response. Returns `false` for a superseded
    /// ticket, in which case nothing changes.
    pub fn route_found(&mut self, ticket: u64, route: RouteResult, destination_label: String) -> bool {
        if self.in_flight != Some(ticket) {
            tracing::debug!(session = %self.id, ticket, "dropping stale route result");
            return false;
        }

        tracing::info!(
            session = %self.id,
            ticket,
            distance_m = route.summary.total_distance_m,
            steps = route.instructions.len(),
            "route found"
        );
        self.in_flight = None;
        self.current = Some(ActiveRoute {
            ticket,
            route,
            destination_label,
        });
        self.elevation = Elevation::Stale;
        self.canvas.clear();
        self.panel_expanded = false;
        self.state = SessionState::Resolved;
        self.status = STATUS_FOUND.to_string();
        true
    }

    /// Routing failed: drop the route and the waypoints so the next click
    /// starts a fresh attempt.
    pub fn route_failed(&mut self, ticket: u64) -> bool {
        if self.in_flight != Some(ticket) {
            tracing::debug!(session = %self.id, ticket, "dropping stale routing failure");
            return false;
        }

        self.in_flight = None;
        self.drop_route();
        self.waypoints.clear();
        self.state = SessionState::Failed;
        self.status = STATUS_NOT_FOUND.to_string();
        true
    }

    /// Open the itinerary/elevation panel. Map panning and zoom stay disabled
    /// until [`collapse_panel`](Self::collapse_panel). Returns a ticket when
    /// the elevation still has to be fetched.
    pub fn expand_panel(&mut self) -> Option<ElevationTicket> {
        let active = self.current.as_ref()?;
        self.panel_expanded = true;

        if !matches!(self.elevation, Elevation::Stale) {
            return None;
        }
        self.elevation = Elevation::Loading;
        Some(ElevationTicket {
            route_id: active.ticket,
            points: downsample(&active.route.geometry, self.elevation_cap),
            total_distance_m: active.route.summary.total_distance_m,
        })
    }

    pub fn collapse_panel(&mut self) {
        self.panel_expanded = false;
    }

    pub fn elevation_loaded(
        &mut self,
        route_id: u64,
        result: Result<Vec<f64>, PlannerError>,
    ) -> bool {
        let Some(active) = self.current.as_ref() else {
            return false;
        };
        if active.ticket != route_id || !matches!(self.elevation, Elevation::Loading) {
            tracing::debug!(session = %self.id, route_id, "dropping stale elevation result");
            return false;
        }

        let total = active.route.summary.total_distance_m;
        match result {
            Ok(samples) if !samples.is_empty() => {
                let stats = elevation_stats(&samples, total);
                self.canvas.draw(&samples, Some(total), self.units);
                self.elevation = Elevation::Loaded(stats);
            }
            Ok(_) => {
                tracing::warn!(session = %self.id, "elevation service returned no samples");
                self.elevation = Elevation::Failed;
            }
            Err(err) => {
                tracing::warn!(session = %self.id, "elevation lookup failed: {err}");
                self.elevation = Elevation::Failed;
            }
        }
        true
    }

    pub fn set_panel_bounds(&mut self, bounds: Option<ScreenRect>) {
        self.panel_bounds = bounds;
    }

    pub fn recenter(&mut self, coordinate: Coordinate) {
        self.map_center = Some(coordinate);
    }

    /// Explicit "clear route": back to a blank session.
    pub fn clear(&mut self) {
        self.in_flight = None;
        self.drop_route();
        self.waypoints.clear();
        self.state = SessionState::Idle;
        self.status = STATUS_IDLE.to_string();
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            state: self.state,
            mode: self.mode,
            status: self.status.clone(),
            waypoints: self.waypoints.clone(),
            route: self.route().cloned(),
            panel: self.panel(),
            panel_expanded: self.panel_expanded,
            elevation: self.elevation_section(),
            map_interactions_enabled: self.map_interactions_enabled(),
            map_center: self.map_center,
        }
    }

    fn panel(&self) -> Option<InfoPanel> {
        let active = self.current.as_ref()?;
        let summary = active.route.summary;
        let itinerary = active
            .route
            .instructions
            .iter()
            .map(|step| ItineraryStep {
                text: step.text.clone(),
                distance: format_distance(step.distance_m, self.units),
                time: format_duration(step.time_s / 60.0),
            })
            .collect();

        Some(InfoPanel {
            destination_label: active.destination_label.clone(),
            distance: format_distance(summary.total_distance_m, self.units),
            time: format_duration(summary.total_time_s / 60.0),
            itinerary,
            tags: self.tags(summary.total_distance_m),
        })
    }

    fn tags(&self, total_distance_m: f64) -> Vec<String> {
        let mut tags = Vec::with_capacity(2);
        tags.push(
            if total_distance_m < SHORT_RIDE_M {
                "Short ride"
            } else if total_distance_m < HALF_DAY_RIDE_M {
                "Half-day ride"
            } else {
                "Long ride"
            }
            .to_string(),
        );
        if let Elevation::Loaded(stats) = &self.elevation {
            tags.push(
                if stats.average_grade_pct < FLAT_GRADE_PCT {
                    "Flat"
                } else if stats.average_grade_pct < ROLLING_GRADE_PCT {
                    "Rolling"
                } else {
                    "Hilly"
                }
                .to_string(),
            );
        }
        tags
    }

    fn elevation_section(&self) -> ElevationSection {
        match &self.elevation {
            Elevation::Empty => ElevationSection::Empty,
            Elevation::Stale => ElevationSection::Stale,
            Elevation::Loading => ElevationSection::Loading,
            Elevation::Failed => ElevationSection::Failed {
                message: ELEVATION_FAILURE_MESSAGE.to_string(),
            },
            Elevation::Loaded(stats) => {
                let total = self
                    .route()
                    .map(|route| route.summary.total_distance_m)
                    .unwrap_or_default();
                ElevationSection::Loaded {
                    ascent: format_elevation(stats.total_ascent_m, self.units),
                    descent: format_elevation(stats.total_descent_m, self.units),
                    average_grade: format_grade(stats.average_grade_pct),
                    max_grade: show_max_grade(total).then(|| format_grade(stats.max_grade_pct)),
                    stats: *stats,
                    chart: self.canvas.current().cloned(),
                }
            }
        }
    }

    fn hits_panel(&self, click: &MapClick) -> bool {
        match (self.current.is_some(), self.panel_bounds, click.screen) {
            (true, Some(bounds), Some(point)) => bounds.contains(point),
            _ => false,
        }
    }

    /// The point a new click would connect to.
    fn anchor(&self) -> Option<Coordinate> {
        match self.mode {
            ClickMode::SingleDestination => self.waypoints.first().copied(),
            ClickMode::MultiWaypoint => self.waypoints.last().copied(),
        }
    }

    fn start_over(&mut self, point: Coordinate) {
        self.in_flight = None;
        self.waypoints = vec![point];
        self.state = SessionState::Collecting;
        self.status = match self.mode {
            ClickMode::SingleDestination => STATUS_PICK_DESTINATION,
            ClickMode::MultiWaypoint => STATUS_PICK_SECOND,
        }
        .to_string();
    }

    fn issue_ticket(&mut self) -> RouteTicket {
        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        self.state = SessionState::Pending;
        self.status = STATUS_PENDING.to_string();
        RouteTicket {
            id: self.next_ticket,
            waypoints: self.waypoints.clone(),
        }
    }

    fn drop_route(&mut self) {
        self.current = None;
        self.elevation = Elevation::Empty;
        self.canvas.clear();
        self.panel_expanded = false;
    }
}

#[cfg(test)]
mod tests {
    use shared::{Instruction, RouteSummary, ScreenPoint};

    use super::*;

    fn session(mode: ClickMode) -> RouteSession {
        RouteSession::new(Uuid::new_v4(), mode, Units::Metric)
    }

    fn at(lat: f64, lon: f64) -> MapClick {
        MapClick {
            coordinate: Coordinate::new(lat, lon),
            screen: None,
        }
    }

    fn route(distance_m: f64) -> RouteResult {
        RouteResult {
            geometry: (0..10)
                .map(|i| Coordinate::new(45.50 + i as f64 * 0.001, -73.56))
                .collect(),
            summary: RouteSummary {
                total_distance_m: distance_m,
                total_time_s: 5_400.0,
            },
            instructions: vec![
                Instruction {
                    text: "Head north".into(),
                    distance_m: 1_200.0,
                    time_s: 240.0,
                },
                Instruction {
                    text: "Arrive".into(),
                    distance_m: 0.0,
                    time_s: 0.0,
                },
            ],
        }
    }

    fn expect_request(outcome: ClickOutcome) -> RouteTicket {
        match outcome {
            ClickOutcome::Request(ticket) => ticket,
            other => panic!("expected a routing request, got {other:?}"),
        }
    }

    fn resolved(mode: ClickMode) -> (RouteSession, RouteTicket) {
        let mut session = session(mode);
        session.click(at(45.50, -73.56));
        let ticket = expect_request(session.click(at(45.52, -73.58)));
        assert!(session.route_found(ticket.id, route(12_000.0), "Destination".into()));
        (session, ticket)
    }

    #[test]
    fn first_click_starts_collecting() {
        let mut session = session(ClickMode::SingleDestination);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.status(), STATUS_IDLE);

        assert_eq!(session.click(at(45.5, -73.5)), ClickOutcome::Collecting);
        assert_eq!(session.state(), SessionState::Collecting);
        assert_eq!(session.status(), STATUS_PICK_DESTINATION);
        assert_eq!(session.waypoints().len(), 1);
    }

    #[test]
    fn second_click_issues_request() {
        let mut session = session(ClickMode::SingleDestination);
        session.click(at(45.5, -73.5));
        let ticket = expect_request(session.click(at(45.6, -73.6)));

        assert_eq!(ticket.waypoints.len(), 2);
        assert_eq!(ticket.destination(), Some(Coordinate::new(45.6, -73.6)));
        assert_eq!(session.state(), SessionState::Pending);
        assert_eq!(session.status(), STATUS_PENDING);
    }

    #[test]
    fn identical_endpoints_never_request() {
        let mut session = session(ClickMode::SingleDestination);
        session.click(at(45.5, -73.5));

        assert_eq!(session.click(at(45.5, -73.5)), ClickOutcome::Rejected);
        assert_eq!(session.status(), STATUS_SAME_POINT);
        assert_eq!(session.state(), SessionState::Collecting);

        // Still accepts a proper destination afterwards.
        expect_request(session.click(at(45.51, -73.5)));
    }

    #[test]
    fn success_populates_panel_and_marks_elevation_stale() {
        let (session, _) = resolved(ClickMode::SingleDestination);
        let view = session.view();

        assert_eq!(view.state, SessionState::Resolved);
        assert_eq!(view.status, STATUS_FOUND);
        let panel = view.panel.unwrap();
        assert_eq!(panel.destination_label, "Destination");
        assert_eq!(panel.distance, "12 km");
        assert_eq!(panel.time, "1h 30min");
        assert_eq!(panel.itinerary.len(), 2);
        assert_eq!(panel.itinerary[0].distance, "1.2 km");
        assert_eq!(panel.itinerary[0].time, "4 min");
        assert_eq!(panel.tags, vec!["Half-day ride".to_string()]);
        assert_eq!(view.elevation, ElevationSection::Stale);
        assert!(view.map_interactions_enabled);
    }

    #[test]
    fn failure_resets_waypoints() {
        let mut session = session(ClickMode::SingleDestination);
        session.click(at(45.5, -73.5));
        let ticket = expect_request(session.click(at(45.6, -73.6)));

        assert!(session.route_failed(ticket.id));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.status(), STATUS_NOT_FOUND);
        assert!(session.waypoints().is_empty());
        assert!(session.view().panel.is_none());

        assert_eq!(session.click(at(45.7, -73.7)), ClickOutcome::Collecting);
        assert_eq!(session.waypoints(), &[Coordinate::new(45.7, -73.7)]);
    }

    #[test]
    fn failure_then_success_leaves_no_residue() {
        let mut session = session(ClickMode::SingleDestination);
        session.click(at(45.5, -73.5));
        let failed = expect_request(session.click(at(45.6, -73.6)));
        session.route_failed(failed.id);

        session.click(at(45.4, -73.4));
        let ticket = expect_request(session.click(at(45.45, -73.45)));
        assert!(session.route_found(ticket.id, route(3_000.0), "Somewhere".into()));

        let view = session.view();
        assert_eq!(view.status, STATUS_FOUND);
        let panel = view.panel.unwrap();
        assert_eq!(panel.destination_label, "Somewhere");
        assert_eq!(panel.distance, "3 km");
        assert_eq!(panel.itinerary.len(), 2);
        assert_eq!(view.waypoints.len(), 2);
    }

    #[test]
    fn superseded_result_is_dropped() {
        let mut session = session(ClickMode::SingleDestination);
        session.click(at(45.5, -73.5));
        let first = expect_request(session.click(at(45.6, -73.6)));
        let second = expect_request(session.click(at(45.7, -73.7)));
        assert!(second.id > first.id);
        assert!(!session.is_current(first.id));
        assert!(session.is_current(second.id));

        assert!(session.route_found(second.id, route(20_000.0), "Second".into()));
        assert!(!session.route_found(first.id, route(1_000.0), "First".into()));
        assert!(!session.route_failed(first.id));

        assert_eq!(session.destination_label(), Some("Second"));
        assert_eq!(session.state(), SessionState::Resolved);
    }

    #[test]
    fn click_in_panel_is_ignored() {
        let (mut session, _) = resolved(ClickMode::SingleDestination);
        session.set_panel_bounds(Some(ScreenRect {
            left: 0.0,
            top: 0.0,
            width: 300.0,
            height: 600.0,
        }));

        let inside = MapClick {
            coordinate: Coordinate::new(45.9, -73.9),
            screen: Some(ScreenPoint { x: 120.0, y: 200.0 }),
        };
        assert_eq!(session.click(inside), ClickOutcome::Ignored);
        assert_eq!(session.state(), SessionState::Resolved);

        let outside = MapClick {
            screen: Some(ScreenPoint { x: 800.0, y: 200.0 }),
            ..inside
        };
        expect_request(session.click(outside));
    }

    #[test]
    fn single_mode_keeps_start_for_new_destination() {
        let (mut session, first) = resolved(ClickMode::SingleDestination);
        let next = expect_request(session.click(at(45.55, -73.60)));
        assert_eq!(next.waypoints[0], first.waypoints[0]);
        assert_eq!(next.waypoints.len(), 2);
    }

    #[test]
    fn multi_mode_accumulates_waypoints() {
        let mut session = session(ClickMode::MultiWaypoint);
        session.click(at(45.50, -73.56));
        assert_eq!(session.status(), STATUS_PICK_SECOND);
        expect_request(session.click(at(45.51, -73.57)));
        let third = expect_request(session.click(at(45.52, -73.58)));
        assert_eq!(third.waypoints.len(), 3);

        assert_eq!(session.click(at(45.52, -73.58)), ClickOutcome::Rejected);
        assert_eq!(session.waypoints().len(), 3);
    }

    #[test]
    fn drag_reissues_request() {
        let (mut session, _) = resolved(ClickMode::MultiWaypoint);
        let ticket = expect_request(session.drag_waypoint(1, Coordinate::new(45.53, -73.59)).unwrap());
        assert_eq!(ticket.waypoints[1], Coordinate::new(45.53, -73.59));

        assert!(matches!(
            session.drag_waypoint(5, Coordinate::new(0.0, 0.0)),
            Err(PlannerError::WaypointIndex { index: 5, len: 2 })
        ));
        assert_eq!(
            session.drag_waypoint(1, Coordinate::new(45.50, -73.56)).unwrap(),
            ClickOutcome::Rejected
        );
    }

    #[test]
    fn expanding_panel_requests_elevation_once() {
        let (mut session, ticket) = resolved(ClickMode::SingleDestination);

        let elevation = session.expand_panel().unwrap();
        assert_eq!(elevation.route_id, ticket.id);
        assert_eq!(elevation.points.len(), 10);
        assert!(!session.map_interactions_enabled());
        assert_eq!(session.view().elevation, ElevationSection::Loading);

        assert!(session.expand_panel().is_none());
        session.collapse_panel();
        assert!(session.map_interactions_enabled());
    }

    #[test]
    fn expanding_without_route_does_nothing() {
        let mut session = session(ClickMode::SingleDestination);
        assert!(session.expand_panel().is_none());
        assert!(session.map_interactions_enabled());
    }

    #[test]
    fn elevation_geometry_is_downsampled() {
        let mut session = session(ClickMode::SingleDestination).with_elevation_cap(4);
        session.click(at(45.50, -73.56));
        let ticket = expect_request(session.click(at(45.52, -73.58)));
        session.route_found(ticket.id, route(12_000.0), "x".into());
        let elevation = session.expand_panel().unwrap();
        assert!(elevation.points.len() <= 4);
    }

    #[test]
    fn loaded_elevation_fills_section() {
        let (mut session, _) = resolved(ClickMode::SingleDestination);
        let ticket = session.expand_panel().unwrap();

        assert!(session.elevation_loaded(ticket.route_id, Ok(vec![100.0, 130.0, 120.0, 160.0])));
        match session.view().elevation {
            ElevationSection::Loaded {
                ascent,
                descent,
                max_grade,
                chart,
                ..
            } => {
                assert_eq!(ascent, "70 m");
                assert_eq!(descent, "10 m");
                // 12 km route: under the max grade threshold.
                assert_eq!(max_grade, None);
                assert_eq!(chart.unwrap().values.len(), 4);
            }
            other => panic!("unexpected section {other:?}"),
        }
        let tags = session.view().panel.unwrap().tags;
        assert_eq!(tags, vec!["Half-day ride".to_string(), "Flat".to_string()]);
    }

    #[test]
    fn max_grade_only_on_long_routes() {
        let mut session = session(ClickMode::SingleDestination);
        session.click(at(45.50, -73.56));
        let ticket = expect_request(session.click(at(45.9, -73.9)));
        session.route_found(ticket.id, route(80_000.0), "Far".into());
        let elevation = session.expand_panel().unwrap();
        session.elevation_loaded(elevation.route_id, Ok(vec![100.0, 900.0, 300.0]));

        match session.view().elevation {
            ElevationSection::Loaded { max_grade, .. } => assert_eq!(max_grade.as_deref(), Some("2.0%")),
            other => panic!("unexpected section {other:?}"),
        }
    }

    #[test]
    fn elevation_failure_is_scoped() {
        let (mut session, _) = resolved(ClickMode::SingleDestination);
        let ticket = session.expand_panel().unwrap();
        let err = PlannerError::malformed("elevation", "boom");

        assert!(session.elevation_loaded(ticket.route_id, Err(err)));
        let view = session.view();
        assert_eq!(
            view.elevation,
            ElevationSection::Failed {
                message: ELEVATION_FAILURE_MESSAGE.to_string()
            }
        );
        assert_eq!(view.state, SessionState::Resolved);
        assert!(view.panel.is_some());
    }

    #[test]
    fn stale_elevation_is_dropped_after_new_route() {
        let (mut session, _) = resolved(ClickMode::SingleDestination);
        let old = session.expand_panel().unwrap();

        let next = expect_request(session.click(at(45.58, -73.61)));
        session.route_found(next.id, route(7_000.0), "Newer".into());

        assert!(!session.elevation_loaded(old.route_id, Ok(vec![1.0, 2.0])));
        assert_eq!(session.view().elevation, ElevationSection::Stale);
        assert!(!session.view().panel_expanded);
    }

    #[test]
    fn clear_returns_to_idle() {
        let (mut session, _) = resolved(ClickMode::SingleDestination);
        session.expand_panel();
        session.clear();

        let view = session.view();
        assert_eq!(view.state, SessionState::Idle);
        assert_eq!(view.status, STATUS_IDLE);
        assert!(view.waypoints.is_empty());
        assert!(view.panel.is_none());
        assert_eq!(view.elevation, ElevationSection::Empty);
        assert!(view.map_interactions_enabled);
    }

    #[test]
    fn result_arriving_after_clear_is_dropped() {
        let mut session = session(ClickMode::SingleDestination);
        session.click(at(45.5, -73.5));
        let ticket = expect_request(session.click(at(45.6, -73.6)));
        session.clear();
        assert!(!session.route_found(ticket.id, route(1_000.0), "late".into()));
        assert_eq!(session.state(), SessionState::Idle);
    }
}
