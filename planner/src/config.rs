use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use shared::Units;

use crate::routing::DEFAULT_PROFILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UnitsArg {
    Metric,
    Imperial,
}

impl From<UnitsArg> for Units {
    fn from(value: UnitsArg) -> Self {
        match value {
            UnitsArg::Metric => Units::Metric,
            UnitsArg::Imperial => Units::Imperial,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Cycling route planner backend")]
pub struct PlannerConfig {
    /// Address the HTTP API listens on
    #[arg(long, env = "PLANNER_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// OpenRouteService API key, used for routing and elevation
    #[arg(long, env = "ORS_API_KEY", default_value = "", hide_env_values = true)]
    pub ors_api_key: String,

    #[arg(long, env = "ORS_BASE_URL", default_value = "https://api.openrouteservice.org")]
    pub ors_base_url: String,

    #[arg(long, env = "NOMINATIM_BASE_URL", default_value = "https://nominatim.openstreetmap.org")]
    pub nominatim_base_url: String,

    #[arg(long, env = "ROUTING_PROFILE", default_value = DEFAULT_PROFILE)]
    pub routing_profile: String,

    /// Maximum number of place search results
    #[arg(long, env = "SEARCH_LIMIT", default_value_t = 5)]
    pub search_limit: usize,

    #[arg(long, env = "SEARCH_DEBOUNCE_MS", default_value_t = 100)]
    pub search_debounce_ms: u64,

    /// Maximum number of route points sent to the elevation service
    #[arg(long, env = "ELEVATION_SAMPLE_CAP", default_value_t = 300)]
    pub elevation_sample_cap: usize,

    #[arg(long, env = "UNITS", value_enum, default_value_t = UnitsArg::Metric)]
    pub units: UnitsArg,

    /// Write the most recent route to this GPX file
    #[arg(long, env = "SAVED_ROUTE_PATH")]
    pub saved_route_path: Option<PathBuf>,

    /// Replace the built-in trail catalogue
    #[arg(long, env = "TRAILS_JSON")]
    pub trails_json: Option<PathBuf>,

    /// Timeout for collaborator HTTP calls; none by default
    #[arg(long, env = "HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,
}

impl PlannerConfig {
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}
