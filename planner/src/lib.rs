pub mod chart;
pub mod config;
pub mod elevation;
pub mod error;
pub mod format;
pub mod geocode;
pub mod gpx_export;
pub mod handlers;
mod http;
pub mod planner;
pub mod routing;
pub mod search;
pub mod session;
pub mod trails;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub use crate::http::build_client;
use crate::planner::{Collaborators, Planner};
use crate::trails::TrailCatalogue;

pub struct AppState<C> {
    pub planner: Arc<Planner<C>>,
    pub trails: Arc<TrailCatalogue>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            planner: Arc::clone(&self.planner),
            trails: Arc::clone(&self.trails),
        }
    }
}

pub fn create_router<C: Collaborators>(state: AppState<C>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/sessions", post(handlers::create_session::<C>))
        .route(
            "/api/sessions/:id",
            get(handlers::get_session::<C>).delete(handlers::delete_session::<C>),
        )
        .route("/api/sessions/:id/click", post(handlers::click::<C>))
        .route(
            "/api/sessions/:id/waypoints/:index",
            post(handlers::drag_waypoint::<C>),
        )
        .route("/api/sessions/:id/clear", post(handlers::clear::<C>))
        .route("/api/sessions/:id/panel-bounds", put(handlers::panel_bounds::<C>))
        .route(
            "/api/sessions/:id/elevation/expand",
            post(handlers::expand_elevation::<C>),
        )
        .route(
            "/api/sessions/:id/elevation/collapse",
            post(handlers::collapse_elevation::<C>),
        )
        .route("/api/sessions/:id/gpx", get(handlers::gpx::<C>))
        .route(
            "/api/sessions/:id/search",
            post(handlers::search_input::<C>).get(handlers::search_results::<C>),
        )
        .route(
            "/api/sessions/:id/search/select",
            post(handlers::select_place::<C>),
        )
        .route("/api/trails", get(handlers::trails::<C>))
        .layer(cors)
        .with_state(state)
}
