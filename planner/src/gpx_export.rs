use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use shared::{Coordinate, RouteResult};
use tokio::task::JoinHandle;

use crate::error::PlannerError;

const CREATOR: &str = "cycle-planner";

pub fn build_gpx(route: &RouteResult, waypoints: &[Coordinate], name: &str) -> Gpx {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };

    for (idx, coord) in waypoints.iter().enumerate() {
        let mut waypoint = to_waypoint(coord);
        waypoint.name = Some(format!("Waypoint {}", idx + 1));
        gpx.waypoints.push(waypoint);
    }

    let mut track = Track {
        name: Some(name.to_string()),
        description: Some(format!(
            "{:.0} m, {:.0} s, saved {}",
            route.summary.total_distance_m,
            route.summary.total_time_s,
            Utc::now().to_rfc3339()
        )),
        ..Default::default()
    };
    let mut segment = TrackSegment::new();
    segment.points.extend(route.geometry.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx
}

pub fn encode_route_as_gpx(
    route: &RouteResult,
    waypoints: &[Coordinate],
    name: &str,
) -> Result<Vec<u8>, PlannerError> {
    let mut buffer = Vec::new();
    gpx::write(&build_gpx(route, waypoints, name), &mut buffer)?;
    Ok(buffer)
}

pub fn encode_route_as_gpx_base64(
    route: &RouteResult,
    waypoints: &[Coordinate],
    name: &str,
) -> Result<String, PlannerError> {
    Ok(BASE64.encode(encode_route_as_gpx(route, waypoints, name)?))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}

/// Receives every successfully resolved route. Fire-and-forget: failures are
/// logged by the sink and never reach the session. Implementations must not
/// block the calling task.
pub trait RouteSink: Send + Sync {
    fn save(&self, route: &RouteResult, waypoints: &[Coordinate], label: &str);
}

pub struct NoopSink;

impl RouteSink for NoopSink {
    fn save(&self, _route: &RouteResult, _waypoints: &[Coordinate], _label: &str) {}
}

/// Keeps the most recent route as a GPX file, overwriting the previous one.
#[derive(Debug, Clone)]
pub struct GpxFileSink {
    path: PathBuf,
}

impl GpxFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write the file on the blocking pool. The handle completes once the
    /// file is written or the failure has been logged. Must be called from
    /// within a tokio runtime.
    pub fn save_in_background(
        &self,
        route: &RouteResult,
        waypoints: &[Coordinate],
        label: &str,
    ) -> JoinHandle<()> {
        let path = self.path.clone();
        let route = route.clone();
        let waypoints = waypoints.to_vec();
        let label = label.to_string();

        tokio::task::spawn_blocking(move || match write_gpx_file(&path, &route, &waypoints, &label) {
            Ok(()) => tracing::info!("saved latest route to {}", path.display()),
            Err(err) => tracing::warn!("could not save route to {}: {err}", path.display()),
        })
    }
}

impl RouteSink for GpxFileSink {
    fn save(&self, route: &RouteResult, waypoints: &[Coordinate], label: &str) {
        // Detached; the write outlives the request.
        drop(self.save_in_background(route, waypoints, label));
    }
}

fn write_gpx_file(
    path: &Path,
    route: &RouteResult,
    waypoints: &[Coordinate],
    label: &str,
) -> Result<(), PlannerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    gpx::write(&build_gpx(route, waypoints, label), BufWriter::new(file))?;
    Ok(())
}
