use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{
    ApiError, Coordinate, CreateSessionRequest, GpxDownload, MapClick, ScreenRect, SearchInput,
    SearchResults, SelectPlaceRequest, SessionView, TrailCard,
};
use uuid::Uuid;

use crate::error::PlannerError;
use crate::planner::Collaborators;
use crate::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// POST /api/sessions - Start a session on page load
pub async fn create_session<C: Collaborators>(
    State(state): State<AppState<C>>,
    request: Option<Json<CreateSessionRequest>>,
) -> (StatusCode, Json<SessionView>) {
    let Json(request) = request.unwrap_or_default();
    let view = state.planner.create_session(request).await;
    (StatusCode::CREATED, Json(view))
}

/// GET /api/sessions/:id
pub async fn get_session<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    state.planner.view(id).await.map(Json).map_err(api_error)
}

/// DELETE /api/sessions/:id
pub async fn delete_session<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    state
        .planner
        .remove_session(id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(api_error)
}

/// POST /api/sessions/:id/click - Answers once the click has been routed
pub async fn click<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
    Json(click): Json<MapClick>,
) -> ApiResult<SessionView> {
    state.planner.click(id, click).await.map(Json).map_err(api_error)
}

/// POST /api/sessions/:id/waypoints/:index - Drag a waypoint
pub async fn drag_waypoint<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(coordinate): Json<Coordinate>,
) -> ApiResult<SessionView> {
    state
        .planner
        .drag(id, index, coordinate)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /api/sessions/:id/clear
pub async fn clear<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    state.planner.clear(id).await.map(Json).map_err(api_error)
}

/// PUT /api/sessions/:id/panel-bounds - `null` when the panel is hidden
pub async fn panel_bounds<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
    Json(bounds): Json<Option<ScreenRect>>,
) -> ApiResult<SessionView> {
    state
        .planner
        .set_panel_bounds(id, bounds)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /api/sessions/:id/elevation/expand
pub async fn expand_elevation<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    state.planner.expand_elevation(id).await.map(Json).map_err(api_error)
}

/// POST /api/sessions/:id/elevation/collapse
pub async fn collapse_elevation<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    state.planner.collapse_elevation(id).await.map(Json).map_err(api_error)
}

/// GET /api/sessions/:id/gpx
pub async fn gpx<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
) -> ApiResult<GpxDownload> {
    state.planner.gpx(id).await.map(Json).map_err(api_error)
}

/// POST /api/sessions/:id/search - One keystroke in the search box
pub async fn search_input<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
    Json(input): Json<SearchInput>,
) -> ApiResult<SearchResults> {
    state
        .planner
        .search_input(id, &input.query)
        .await
        .map(Json)
        .map_err(api_error)
}

/// GET /api/sessions/:id/search
pub async fn search_results<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SearchResults> {
    state.planner.search_results(id).await.map(Json).map_err(api_error)
}

/// POST /api/sessions/:id/search/select - Pick a result, or the best match
pub async fn select_place<C: Collaborators>(
    State(state): State<AppState<C>>,
    Path(id): Path<Uuid>,
    request: Option<Json<SelectPlaceRequest>>,
) -> ApiResult<SessionView> {
    let Json(request) = request.unwrap_or_default();
    state
        .planner
        .select_place(id, request)
        .await
        .map(Json)
        .map_err(api_error)
}

#[derive(Debug, Default, Deserialize)]
pub struct TrailQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /api/trails?q=
pub async fn trails<C: Collaborators>(
    State(state): State<AppState<C>>,
    Query(query): Query<TrailQuery>,
) -> Json<Vec<TrailCard>> {
    let units = state.planner.settings().units;
    Json(state.trails.cards(&query.q, units))
}

fn api_error(err: PlannerError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        PlannerError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        PlannerError::WaypointIndex { .. } => StatusCode::BAD_REQUEST,
        PlannerError::NothingToExport => StatusCode::CONFLICT,
        PlannerError::NoRoute => StatusCode::UNPROCESSABLE_ENTITY,
        PlannerError::Transport { .. }
        | PlannerError::Status { .. }
        | PlannerError::Malformed { .. } => StatusCode::BAD_GATEWAY,
        PlannerError::Gpx(_) | PlannerError::Catalogue(_) | PlannerError::Io(_) => {
            tracing::error!("request failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
