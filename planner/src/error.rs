use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} answered with status {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("malformed {service} response: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },
    #[error("no route found between the requested waypoints")]
    NoRoute,
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error("waypoint index {index} out of range ({len} waypoints)")]
    WaypointIndex { index: usize, len: usize },
    #[error("no route to export")]
    NothingToExport,
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("invalid trail catalogue: {0}")]
    Catalogue(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    pub(crate) fn malformed(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            reason: reason.into(),
        }
    }
}
