use std::future::Future;

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{Coordinate, ElevationStats};

use crate::error::PlannerError;
use crate::http::{check_status, transport, trim_base};

/// Upper bound on the number of points sent to the elevation service.
pub const MAX_ELEVATION_SAMPLES: usize = 300;
/// Max grade is only worth showing on long rides.
pub const MAX_GRADE_DISPLAY_THRESHOLD_M: f64 = 50_000.0;
pub const ELEVATION_FAILURE_MESSAGE: &str = "Could not load elevation data.";

const SERVICE: &str = "elevation";

pub trait ElevationService: Send + Sync + 'static {
    /// One elevation in meters per input point, in input order.
    fn elevations(
        &self,
        points: &[Coordinate],
    ) -> impl Future<Output = Result<Vec<f64>, PlannerError>> + Send;
}

/// Keep every N-th point so that at most `cap` points remain.
pub fn downsample(geometry: &[Coordinate], cap: usize) -> Vec<Coordinate> {
    if cap == 0 || geometry.len() <= cap {
        return geometry.to_vec();
    }
    let step = geometry.len().div_ceil(cap);
    geometry.iter().step_by(step).copied().collect()
}

/// Ascent, descent and grades assuming the samples are evenly spread over
/// `total_distance_m`.
pub fn elevation_stats(samples: &[f64], total_distance_m: f64) -> ElevationStats {
    if samples.len() < 2 {
        return ElevationStats::default();
    }

    let segment_m = total_distance_m / (samples.len() - 1) as f64;
    let mut stats = ElevationStats::default();
    let mut grade_sum = 0.0;

    for pair in samples.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            stats.total_ascent_m += delta;
        } else {
            stats.total_descent_m += delta.abs();
        }

        if segment_m > 0.0 {
            let grade = (delta / segment_m).abs() * 100.0;
            grade_sum += grade;
            stats.max_grade_pct = stats.max_grade_pct.max(grade);
        }
    }

    if segment_m > 0.0 {
        stats.average_grade_pct = grade_sum / (samples.len() - 1) as f64;
    }
    stats
}

pub fn show_max_grade(total_distance_m: f64) -> bool {
    total_distance_m > MAX_GRADE_DISPLAY_THRESHOLD_M
}

/// OpenRouteService `elevation/line` client.
#[derive(Clone)]
pub struct OrsElevationClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct ElevationLineRequest<'a> {
    format_in: &'static str,
    format_out: &'static str,
    geometry: LineString<'a>,
}

#[derive(Serialize)]
struct LineString<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: &'a [[f64; 2]],
}

#[derive(Debug, Deserialize)]
struct ElevationLineResponse {
    geometry: ElevatedGeometry,
}

#[derive(Debug, Deserialize)]
struct ElevatedGeometry {
    coordinates: Vec<Vec<f64>>,
}

impl OrsElevationClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url),
            api_key: api_key.into(),
        }
    }

    async fn fetch(&self, points: &[Coordinate]) -> Result<Vec<f64>, PlannerError> {
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let coordinates: Vec<[f64; 2]> = points.iter().map(Coordinate::lon_lat).collect();
        let body = ElevationLineRequest {
            format_in: "geojson",
            format_out: "geojson",
            geometry: LineString {
                kind: "LineString",
                coordinates: &coordinates,
            },
        };

        let response = self
            .client
            .post(format!("{}/elevation/line", self.base_url))
            .header(AUTHORIZATION, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport(SERVICE))?;
        let response = check_status(SERVICE, response)?;
        let payload: ElevationLineResponse = response
            .json()
            .await
            .map_err(|err| PlannerError::malformed(SERVICE, err.to_string()))?;

        let elevations = parse_elevations(payload)?;
        tracing::debug!("fetched {} elevations", elevations.len());
        Ok(elevations)
    }
}

impl ElevationService for OrsElevationClient {
    async fn elevations(&self, points: &[Coordinate]) -> Result<Vec<f64>, PlannerError> {
        self.fetch(points).await
    }
}

fn parse_elevations(payload: ElevationLineResponse) -> Result<Vec<f64>, PlannerError> {
    payload
        .geometry
        .coordinates
        .iter()
        .enumerate()
        .map(|(idx, point)| {
            point
                .get(2)
                .copied()
                .ok_or_else(|| PlannerError::malformed(SERVICE, format!("point {idx} has no elevation")))
        })
        .collect()
}
