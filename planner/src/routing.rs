use std::future::Future;

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{Coordinate, Instruction, RouteResult, RouteSummary};

use crate::error::PlannerError;
use crate::http::{check_status, transport, trim_base};

pub const DEFAULT_PROFILE: &str = "cycling-regular";

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const SERVICE: &str = "routing";

pub trait RoutingService: Send + Sync + 'static {
    /// Best route through `waypoints`, in order.
    fn route(
        &self,
        waypoints: &[Coordinate],
    ) -> impl Future<Output = Result<RouteResult, PlannerError>> + Send;
}

/// OpenRouteService directions client (GeoJSON flavour).
#[derive(Clone)]
pub struct OrsRoutingClient {
    client: Client,
    base_url: String,
    api_key: String,
    profile: String,
}

#[derive(Serialize)]
struct DirectionsRequest {
    coordinates: Vec<[f64; 2]>,
    instructions: bool,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<RouteFeature>,
}

#[derive(Debug, Deserialize)]
struct RouteFeature {
    geometry: RouteGeometry,
    properties: RouteProperties,
}

#[derive(Debug, Deserialize)]
struct RouteGeometry {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct RouteProperties {
    #[serde(default)]
    summary: WireSummary,
    #[serde(default)]
    segments: Vec<WireSegment>,
}

// ORS drops zero-valued summary fields.
#[derive(Debug, Default, Deserialize)]
struct WireSummary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct WireSegment {
    #[serde(default)]
    steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    instruction: String,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

impl OrsRoutingClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
            api_key: api_key.into(),
            profile: profile.into(),
        }
    }
}

impl RoutingService for OrsRoutingClient {
    async fn route(&self, waypoints: &[Coordinate]) -> Result<RouteResult, PlannerError> {
        tracing::debug!(
            "requesting {} route through {} waypoints",
            self.profile,
            waypoints.len()
        );
        let body = DirectionsRequest {
            coordinates: waypoints.iter().map(Coordinate::lon_lat).collect(),
            instructions: true,
        };

        let response = self
            .client
            .post(format!(
                "{}/v2/directions/{}/geojson",
                self.base_url, self.profile
            ))
            .header(AUTHORIZATION, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport(SERVICE))?;
        let response = check_status(SERVICE, response)?;
        let payload: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| PlannerError::malformed(SERVICE, err.to_string()))?;

        first_candidate(payload)
    }
}

fn first_candidate(payload: DirectionsResponse) -> Result<RouteResult, PlannerError> {
    let feature = payload
        .features
        .into_iter()
        .next()
        .ok_or(PlannerError::NoRoute)?;

    let geometry = feature
        .geometry
        .coordinates
        .iter()
        .map(|pair| match pair.as_slice() {
            [lon, lat, ..] => Ok(Coordinate::new(*lat, *lon)),
            _ => Err(PlannerError::malformed(SERVICE, "coordinate with fewer than two components")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let instructions = feature
        .properties
        .segments
        .into_iter()
        .flat_map(|segment| segment.steps)
        .map(|step| Instruction {
            text: step.instruction,
            distance_m: step.distance,
            time_s: step.duration,
        })
        .collect();

    let summary = feature.properties.summary;
    let total_distance_m = if summary.distance > 0.0 {
        summary.distance
    } else {
        path_length_m(&geometry)
    };

    Ok(RouteResult {
        geometry,
        summary: RouteSummary {
            total_distance_m,
            total_time_s: summary.duration,
        },
        instructions,
    })
}

pub fn path_length_m(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
