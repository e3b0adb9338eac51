use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::PlannerError;

const USER_AGENT: &str = concat!("cycle-planner/", env!("CARGO_PKG_VERSION"));

/// Shared reqwest client for every collaborator. Without a timeout the
/// collaborator's own behaviour applies.
pub fn build_client(timeout: Option<Duration>) -> Result<Client, PlannerError> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|source| PlannerError::Transport {
        service: "http client",
        source,
    })
}

pub(crate) fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> PlannerError {
    move |source| PlannerError::Transport { service, source }
}

pub(crate) fn check_status(service: &'static str, response: Response) -> Result<Response, PlannerError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PlannerError::Status { service, status })
    }
}

pub(crate) fn trim_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}
