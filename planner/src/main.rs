use std::sync::Arc;

use clap::Parser;
use planner::{
    build_client,
    config::PlannerConfig,
    create_router,
    error::PlannerError,
    gpx_export::{GpxFileSink, NoopSink, RouteSink},
    planner::{HttpCollaborators, Planner, PlannerSettings},
    trails::TrailCatalogue,
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), PlannerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planner=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PlannerConfig::parse();
    if config.ors_api_key.is_empty() {
        tracing::warn!("ORS_API_KEY is not set, routing and elevation requests will be rejected");
    }

    let client = build_client(config.http_timeout())?;
    let collaborators = HttpCollaborators::new(
        client,
        &config.ors_base_url,
        &config.ors_api_key,
        &config.routing_profile,
        &config.nominatim_base_url,
    );

    let sink: Arc<dyn RouteSink> = match &config.saved_route_path {
        Some(path) => {
            tracing::info!("saving the latest route to {}", path.display());
            Arc::new(GpxFileSink::new(path))
        }
        None => Arc::new(NoopSink),
    };

    let trails = match &config.trails_json {
        Some(path) => TrailCatalogue::from_path(path)?,
        None => TrailCatalogue::builtin()?,
    };
    tracing::info!("loaded {} featured trails", trails.len());

    let settings = PlannerSettings {
        units: config.units.into(),
        elevation_cap: config.elevation_sample_cap,
        search_debounce: config.search_debounce(),
        search_limit: config.search_limit,
    };
    let state = AppState {
        planner: Arc::new(Planner::new(Arc::new(collaborators), sink, settings)),
        trails: Arc::new(trails),
    };
    let app = create_router(state);

    tracing::info!(
        profile = %config.routing_profile,
        ors = %config.ors_base_url,
        nominatim = %config.nominatim_base_url,
        "starting planner on http://{}",
        config.addr
    );
    tracing::info!("  POST /api/sessions");
    tracing::info!("  POST /api/sessions/:id/click");
    tracing::info!("  POST /api/sessions/:id/search");
    tracing::info!("  GET  /api/trails?q=");

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
