//! Drives route sessions against the outside world.
//!
//! [`RouteSession`] decides what to ask for; the planner runs the requests
//! without holding the session lock, then hands the results back. Each
//! session also owns its own debounced place search.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use shared::{
    Address, Coordinate, CreateSessionRequest, GpxDownload, MapClick, Place,
    RouteResult, ScreenRect, SearchResults, SelectPlaceRequest, SessionView, Units,
};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::elevation::{ElevationService, OrsElevationClient, MAX_ELEVATION_SAMPLES};
use crate::error::PlannerError;
use crate::format::format_coordinate;
use crate::geocode::{address_label, Geocoder, NominatimClient};
use crate::gpx_export::{encode_route_as_gpx_base64, RouteSink};
use crate::routing::{OrsRoutingClient, RoutingService};
use crate::search::{DebouncedSearch, PlaceSearch, DEFAULT_DEBOUNCE, DEFAULT_RESULT_LIMIT};
use crate::session::{ClickOutcome, RouteSession, RouteTicket};

/// Everything a planner talks to.
pub trait Collaborators: RoutingService + ElevationService + Geocoder + PlaceSearch {}

impl<T> Collaborators for T where T: RoutingService + ElevationService + Geocoder + PlaceSearch {}

/// OpenRouteService for routes and elevation, Nominatim for addresses.
#[derive(Clone)]
pub struct HttpCollaborators {
    routing: OrsRoutingClient,
    elevation: OrsElevationClient,
    places: NominatimClient,
}

impl HttpCollaborators {
    pub fn new(
        client: Client,
        ors_base_url: &str,
        ors_api_key: &str,
        profile: &str,
        nominatim_base_url: &str,
    ) -> Self {
        Self {
            routing: OrsRoutingClient::new(client.clone(), ors_base_url, ors_api_key, profile),
            elevation: OrsElevationClient::new(client.clone(), ors_base_url, ors_api_key),
            places: NominatimClient::new(client, nominatim_base_url),
        }
    }
}

impl RoutingService for HttpCollaborators {
    async fn route(&self, waypoints: &[Coordinate]) -> Result<RouteResult, PlannerError> {
        self.routing.route(waypoints).await
    }
}

impl ElevationService for HttpCollaborators {
    async fn elevations(&self, points: &[Coordinate]) -> Result<Vec<f64>, PlannerError> {
        self.elevation.elevations(points).await
    }
}

impl Geocoder for HttpCollaborators {
    async fn reverse(&self, coord: Coordinate) -> Result<Option<Address>, PlannerError> {
        self.places.reverse(coord).await
    }
}

impl PlaceSearch for HttpCollaborators {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, PlannerError> {
        self.places.search(query, limit).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlannerSettings {
    pub units: Units,
    pub elevation_cap: usize,
    pub search_debounce: Duration,
    pub search_limit: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            elevation_cap: MAX_ELEVATION_SAMPLES,
            search_debounce: DEFAULT_DEBOUNCE,
            search_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

struct PlannerSession<C> {
    controller: Mutex<RouteSession>,
    search: Mutex<DebouncedSearch<C>>,
}

pub struct Planner<C> {
    collaborators: Arc<C>,
    sink: Arc<dyn RouteSink>,
    settings: PlannerSettings,
    sessions: RwLock<HashMap<Uuid, Arc<PlannerSession<C>>>>,
}

impl<C: Collaborators> Planner<C> {
    pub fn new(collaborators: Arc<C>, sink: Arc<dyn RouteSink>, settings: PlannerSettings) -> Self {
        Self {
            collaborators,
            sink,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub async fn create_session(&self, request: CreateSessionRequest) -> SessionView {
        let id = Uuid::new_v4();
        let units = request.units.unwrap_or(self.settings.units);
        let controller = RouteSession::new(id, request.mode, units)
            .with_elevation_cap(self.settings.elevation_cap);
        let view = controller.view();
        let search = DebouncedSearch::new(
            Arc::clone(&self.collaborators),
            self.settings.search_debounce,
            self.settings.search_limit,
        );

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            Arc::new(PlannerSession {
                controller: Mutex::new(controller),
                search: Mutex::new(search),
            }),
        );
        tracing::info!(session = %id, mode = ?request.mode, active = sessions.len(), "session created");
        view
    }

    pub async fn remove_session(&self, id: Uuid) -> Result<(), PlannerError> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(&id)
            .ok_or(PlannerError::SessionNotFound(id))?;
        tracing::info!(session = %id, active = sessions.len(), "session removed");
        Ok(())
    }

    pub async fn view(&self, id: Uuid) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        let view = session.controller.lock().await.view();
        Ok(view)
    }

    /// Apply a map click and, when it asks for one, wait for the route.
    pub async fn click(&self, id: Uuid, click: MapClick) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        self.apply_click(&session, click).await;
        let view = session.controller.lock().await.view();
        Ok(view)
    }

    pub async fn drag(
        &self,
        id: Uuid,
        index: usize,
        coordinate: Coordinate,
    ) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        let outcome = session.controller.lock().await.drag_waypoint(index, coordinate)?;
        if let ClickOutcome::Request(ticket) = outcome {
            self.resolve(&session, ticket).await;
        }
        let view = session.controller.lock().await.view();
        Ok(view)
    }

    pub async fn clear(&self, id: Uuid) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        let mut controller = session.controller.lock().await;
        controller.clear();
        Ok(controller.view())
    }

    pub async fn set_panel_bounds(
        &self,
        id: Uuid,
        bounds: Option<ScreenRect>,
    ) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        let mut controller = session.controller.lock().await;
        controller.set_panel_bounds(bounds);
        Ok(controller.view())
    }

    /// Open the info panel, fetching the elevation profile on first use.
    pub async fn expand_elevation(&self, id: Uuid) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        let ticket = session.controller.lock().await.expand_panel();
        if let Some(ticket) = ticket {
            tracing::debug!(
                session = %id,
                route = ticket.route_id,
                points = ticket.points.len(),
                "fetching elevation"
            );
            let collaborators = Arc::clone(&self.collaborators);
            let task_session = Arc::clone(&session);
            let fetch = tokio::spawn(async move {
                let result = collaborators.elevations(&ticket.points).await;
                task_session
                    .controller
                    .lock()
                    .await
                    .elevation_loaded(ticket.route_id, result);
            });
            if let Err(err) = fetch.await {
                tracing::warn!(session = %id, "elevation task failed: {err}");
            }
        }
        let view = session.controller.lock().await.view();
        Ok(view)
    }

    pub async fn collapse_elevation(&self, id: Uuid) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        let mut controller = session.controller.lock().await;
        controller.collapse_panel();
        Ok(controller.view())
    }

    pub async fn gpx(&self, id: Uuid) -> Result<GpxDownload, PlannerError> {
        let session = self.session(id).await?;
        let controller = session.controller.lock().await;
        let route = controller.route().ok_or(PlannerError::NothingToExport)?;
        let name = controller.destination_label().unwrap_or("Route");
        let gpx_base64 = encode_route_as_gpx_base64(route, controller.waypoints(), name)?;
        Ok(GpxDownload { gpx_base64 })
    }

    pub async fn search_input(&self, id: Uuid, query: &str) -> Result<SearchResults, PlannerError> {
        let session = self.session(id).await?;
        let mut search = session.search.lock().await;
        search.input(query);
        Ok(SearchResults {
            query: search.query().to_string(),
            places: search.results(),
        })
    }

    pub async fn search_results(&self, id: Uuid) -> Result<SearchResults, PlannerError> {
        let session = self.session(id).await?;
        let search = session.search.lock().await;
        Ok(SearchResults {
            query: search.query().to_string(),
            places: search.results(),
        })
    }

    /// Pick a search result (or the best match without an index), centre
    /// the map on it and treat it as a click.
    pub async fn select_place(
        &self,
        id: Uuid,
        request: SelectPlaceRequest,
    ) -> Result<SessionView, PlannerError> {
        let session = self.session(id).await?;
        let place = {
            let mut search = session.search.lock().await;
            match request.index {
                Some(index) => search.select(index),
                None => search.submit(),
            }
        };

        if let Some(place) = place {
            tracing::debug!(session = %id, place = %place.name, "place selected");
            session.controller.lock().await.recenter(place.coordinate);
            self.apply_click(
                &session,
                MapClick {
                    coordinate: place.coordinate,
                    screen: None,
                },
            )
            .await;
        }
        let view = session.controller.lock().await.view();
        Ok(view)
    }

    async fn session(&self, id: Uuid) -> Result<Arc<PlannerSession<C>>, PlannerError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(PlannerError::SessionNotFound(id))
    }

    async fn apply_click(&self, session: &Arc<PlannerSession<C>>, click: MapClick) {
        let outcome = session.controller.lock().await.click(click);
        if let ClickOutcome::Request(ticket) = outcome {
            self.resolve(session, ticket).await;
        }
    }

    /// Route the ticket on its own task. Dropping the caller (client gone,
    /// proxy timeout) does not leave the session pending.
    async fn resolve(&self, session: &Arc<PlannerSession<C>>, ticket: RouteTicket) {
        let collaborators = Arc::clone(&self.collaborators);
        let sink = Arc::clone(&self.sink);
        let session = Arc::clone(session);
        let id = ticket.id;
        let task = tokio::spawn(async move {
            resolve_route(collaborators.as_ref(), sink, &session, ticket).await;
        });
        if let Err(err) = task.await {
            tracing::warn!(ticket = id, "routing task failed: {err}");
        }
    }
}

async fn resolve_route<C: Collaborators>(
    collaborators: &C,
    sink: Arc<dyn RouteSink>,
    session: &PlannerSession<C>,
    ticket: RouteTicket,
) {
    let route = match collaborators.route(&ticket.waypoints).await {
        Ok(route) => route,
        Err(err) => {
            tracing::warn!(ticket = ticket.id, "routing failed: {err}");
            session.controller.lock().await.route_failed(ticket.id);
            return;
        }
    };

    if !session.controller.lock().await.is_current(ticket.id) {
        tracing::debug!(ticket = ticket.id, "route superseded before labelling");
        return;
    }
    let label = destination_label(collaborators, &ticket).await;

    let applied = session
        .controller
        .lock()
        .await
        .route_found(ticket.id, route.clone(), label.clone());
    if applied {
        sink.save(&route, &ticket.waypoints, &label);
    }
}

async fn destination_label<C: Geocoder>(collaborators: &C, ticket: &RouteTicket) -> String {
    let Some(destination) = ticket.destination() else {
        return String::new();
    };
    match collaborators.reverse(destination).await {
        Ok(address) => address
            .as_ref()
            .and_then(address_label)
            .unwrap_or_else(|| format_coordinate(destination)),
        Err(err) => {
            tracing::warn!(ticket = ticket.id, "reverse geocode failed: {err}");
            format_coordinate(destination)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use shared::{ElevationSection, Instruction, RouteSummary, SessionState};

    use super::*;
    use crate::session::{STATUS_FOUND, STATUS_NOT_FOUND, STATUS_SAME_POINT};

    /// Routes are slow for destinations north of 45.6 so tests can race them.
    #[derive(Default)]
    struct FakeWorld {
        routed: StdMutex<Vec<Vec<Coordinate>>>,
        fail_routing: StdMutex<bool>,
        fail_elevation: bool,
        fail_geocode: bool,
        elevation_delay: Duration,
    }

    impl RoutingService for FakeWorld {
        async fn route(&self, waypoints: &[Coordinate]) -> Result<RouteResult, PlannerError> {
            self.routed.lock().unwrap().push(waypoints.to_vec());
            let destination = waypoints[waypoints.len() - 1];
            let delay = if destination.lat > 45.6 { 200 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if *self.fail_routing.lock().unwrap() {
                return Err(PlannerError::NoRoute);
            }
            Ok(RouteResult {
                geometry: waypoints.to_vec(),
                summary: RouteSummary {
                    total_distance_m: destination.lat * 100.0,
                    total_time_s: 600.0,
                },
                instructions: vec![Instruction {
                    text: format!("Ride to {:.2}", destination.lat),
                    distance_m: destination.lat * 100.0,
                    time_s: 600.0,
                }],
            })
        }
    }

    impl ElevationService for FakeWorld {
        async fn elevations(&self, points: &[Coordinate]) -> Result<Vec<f64>, PlannerError> {
            tokio::time::sleep(self.elevation_delay).await;
            if self.fail_elevation {
                return Err(PlannerError::Malformed {
                    service: "elevation",
                    reason: "offline".into(),
                });
            }
            Ok(points.iter().enumerate().map(|(idx, _)| 100.0 + idx as f64).collect())
        }
    }

    impl Geocoder for FakeWorld {
        async fn reverse(&self, coord: Coordinate) -> Result<Option<Address>, PlannerError> {
            if self.fail_geocode {
                return Err(PlannerError::NoRoute);
            }
            Ok(Some(Address {
                road: Some(format!("Rue {:.2}", coord.lat)),
                city: Some("Montréal".into()),
                ..Default::default()
            }))
        }
    }

    impl PlaceSearch for FakeWorld {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Place>, PlannerError> {
            Ok(vec![
                Place {
                    name: format!("{query} market"),
                    coordinate: Coordinate::new(45.53, -73.61),
                    address: Address::default(),
                },
                Place {
                    name: format!("{query} park"),
                    coordinate: Coordinate::new(45.54, -73.62),
                    address: Address::default(),
                },
            ])
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        labels: StdMutex<Vec<String>>,
    }

    impl RouteSink for RecordingSink {
        fn save(&self, _route: &RouteResult, _waypoints: &[Coordinate], label: &str) {
            self.labels.lock().unwrap().push(label.to_string());
        }
    }

    fn planner(world: FakeWorld) -> (Planner<FakeWorld>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let planner = Planner::new(Arc::new(world), sink.clone(), PlannerSettings::default());
        (planner, sink)
    }

    fn at(lat: f64, lon: f64) -> MapClick {
        MapClick {
            coordinate: Coordinate::new(lat, lon),
            screen: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_clicks_produce_a_route() {
        let (planner, sink) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;

        let view = planner.click(id, at(45.50, -73.56)).await.unwrap();
        assert_eq!(view.state, SessionState::Collecting);

        let view = planner.click(id, at(45.52, -73.58)).await.unwrap();
        assert_eq!(view.state, SessionState::Resolved);
        assert_eq!(view.status, STATUS_FOUND);
        let panel = view.panel.unwrap();
        assert_eq!(panel.destination_label, "Rue 45.52, Montréal");
        assert_eq!(panel.time, "10 min");
        assert_eq!(*sink.labels.lock().unwrap(), vec!["Rue 45.52, Montréal".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn newest_request_wins_when_responses_cross() {
        let (planner, sink) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        planner.click(id, at(45.50, -73.56)).await.unwrap();

        // The first destination routes slowly, the second quickly.
        let (slow, fast) = tokio::join!(
            planner.click(id, at(45.70, -73.56)),
            planner.click(id, at(45.55, -73.56)),
        );
        slow.unwrap();
        fast.unwrap();

        let view = planner.view(id).await.unwrap();
        assert_eq!(view.state, SessionState::Resolved);
        assert_eq!(view.waypoints[1], Coordinate::new(45.55, -73.56));
        assert_eq!(view.panel.unwrap().destination_label, "Rue 45.55, Montréal");
        assert_eq!(sink.labels.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_points_never_reach_routing() {
        let (planner, _) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;

        planner.click(id, at(45.50, -73.56)).await.unwrap();
        let view = planner.click(id, at(45.50, -73.56)).await.unwrap();

        assert_eq!(view.status, STATUS_SAME_POINT);
        assert!(planner.collaborators.routed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_then_success() {
        let world = FakeWorld {
            fail_routing: StdMutex::new(true),
            ..Default::default()
        };
        let (planner, sink) = planner(world);
        let id = planner.create_session(CreateSessionRequest::default()).await.id;

        planner.click(id, at(45.50, -73.56)).await.unwrap();
        let view = planner.click(id, at(45.52, -73.58)).await.unwrap();
        assert_eq!(view.state, SessionState::Failed);
        assert_eq!(view.status, STATUS_NOT_FOUND);
        assert!(view.waypoints.is_empty());
        assert!(view.panel.is_none());

        *planner.collaborators.fail_routing.lock().unwrap() = false;
        planner.click(id, at(45.40, -73.50)).await.unwrap();
        let view = planner.click(id, at(45.42, -73.52)).await.unwrap();
        assert_eq!(view.status, STATUS_FOUND);
        assert_eq!(view.panel.unwrap().itinerary.len(), 1);
        assert_eq!(sink.labels.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn geocode_failure_falls_back_to_coordinates() {
        let (planner, _) = planner(FakeWorld {
            fail_geocode: true,
            ..Default::default()
        });
        let id = planner.create_session(CreateSessionRequest::default()).await.id;

        planner.click(id, at(45.50, -73.56)).await.unwrap();
        let view = planner.click(id, at(45.52, -73.58)).await.unwrap();
        assert_eq!(view.panel.unwrap().destination_label, "45.52000, -73.58000");
    }

    #[tokio::test(start_paused = true)]
    async fn elevation_is_fetched_on_expand() {
        let (planner, _) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        planner.click(id, at(45.50, -73.56)).await.unwrap();
        planner.click(id, at(45.52, -73.58)).await.unwrap();

        let view = planner.expand_elevation(id).await.unwrap();
        assert!(view.panel_expanded);
        assert!(!view.map_interactions_enabled);
        assert!(matches!(view.elevation, ElevationSection::Loaded { .. }));

        let view = planner.collapse_elevation(id).await.unwrap();
        assert!(view.map_interactions_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn elevation_failure_keeps_the_route() {
        let (planner, _) = planner(FakeWorld {
            fail_elevation: true,
            ..Default::default()
        });
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        planner.click(id, at(45.50, -73.56)).await.unwrap();
        planner.click(id, at(45.52, -73.58)).await.unwrap();

        let view = planner.expand_elevation(id).await.unwrap();
        assert!(matches!(view.elevation, ElevationSection::Failed { .. }));
        assert_eq!(view.state, SessionState::Resolved);
        assert!(view.panel.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_expand_still_loads_elevation() {
        let (planner, _) = planner(FakeWorld {
            elevation_delay: Duration::from_secs(60),
            ..Default::default()
        });
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        planner.click(id, at(45.50, -73.56)).await.unwrap();
        planner.click(id, at(45.52, -73.58)).await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_secs(1), planner.expand_elevation(id)).await;
        assert!(abandoned.is_err());
        planner.collapse_elevation(id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        let view = planner.expand_elevation(id).await.unwrap();
        assert!(matches!(view.elevation, ElevationSection::Loaded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_click_still_resolves() {
        let (planner, sink) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        planner.click(id, at(45.50, -73.56)).await.unwrap();

        // Destinations north of 45.6 take 200 ms to route.
        let abandoned = tokio::time::timeout(Duration::from_millis(50), planner.click(id, at(45.70, -73.56))).await;
        assert!(abandoned.is_err());
        assert_eq!(planner.view(id).await.unwrap().state, SessionState::Pending);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let view = planner.view(id).await.unwrap();
        assert_eq!(view.state, SessionState::Resolved);
        assert_eq!(view.panel.unwrap().destination_label, "Rue 45.70, Montréal");
        assert_eq!(sink.labels.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_a_place_clicks_it() {
        let (planner, _) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        planner.click(id, at(45.50, -73.56)).await.unwrap();

        planner.search_input(id, "jean-talon").await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let results = planner.search_results(id).await.unwrap();
        assert_eq!(results.places.len(), 2);

        let view = planner
            .select_place(id, SelectPlaceRequest { index: Some(1) })
            .await
            .unwrap();
        assert_eq!(view.map_center, Some(Coordinate::new(45.54, -73.62)));
        assert_eq!(view.state, SessionState::Resolved);
        assert_eq!(view.waypoints[1], Coordinate::new(45.54, -73.62));
        assert!(planner.search_results(id).await.unwrap().places.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn gpx_needs_a_route() {
        let (planner, _) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        assert!(matches!(planner.gpx(id).await, Err(PlannerError::NothingToExport)));

        planner.click(id, at(45.50, -73.56)).await.unwrap();
        planner.click(id, at(45.52, -73.58)).await.unwrap();
        assert!(!planner.gpx(id).await.unwrap().gpx_base64.is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let (planner, _) = planner(FakeWorld::default());
        let id = planner.create_session(CreateSessionRequest::default()).await.id;
        planner.remove_session(id).await.unwrap();

        assert!(matches!(planner.view(id).await, Err(PlannerError::SessionNotFound(_))));
        assert!(matches!(
            planner.remove_session(id).await,
            Err(PlannerError::SessionNotFound(_))
        ));
    }
}
