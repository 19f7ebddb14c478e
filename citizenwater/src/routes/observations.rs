//! HTTP Routes for water-quality observations
//!
//! - POST   /api/observations                       - Submit an observation
//! - GET    /api/observations                       - All observations
//! - GET    /api/observations/{id}                  - One observation
//! - GET    /api/observations/citizen/{id}          - A citizen's observations
//! - GET    /api/observations/citizen/{id}/valid    - A citizen's valid observations
//! - GET    /api/observations/citizen/{id}/count    - Totals for a citizen
//! - GET    /api/observations/postcode/{postcode}   - Observations at a postcode
//! - GET    /api/observations/valid                 - All valid observations
//! - GET    /api/observations/recent                - Newest valid observations
//! - DELETE /api/observations/{id}                  - Remove an observation

use citizenwater_core::{CitizenId, Observation, ObservationSubmission, RECENT_OBSERVATIONS};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::common::{
    json_response, method_not_allowed, not_found_response, ok_json, parse_json_body,
    path_segment, respond, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::types::{Result, ServiceError};

pub const OBSERVATIONS_PREFIX: &str = "/api/observations";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionResponse {
    message: String,
    id: String,
    valid: bool,
    complete: bool,
    observation: Observation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CountResponse {
    count: u64,
    valid_count: u64,
}

fn citizen_from_path(raw: &str) -> Result<CitizenId> {
    Ok(CitizenId::parse(&path_segment(raw)?)?)
}

async fn handle_submit(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let submission: ObservationSubmission = parse_json_body(req).await?;
    let observation = Observation::from_submission(submission, chrono::Utc::now())?;
    let observation = state.observations.insert(observation).await?;

    info!(
        observation_id = %observation.id,
        citizen_id = %observation.citizen_id,
        postcode = %observation.postcode,
        complete = observation.complete,
        "Observation stored"
    );

    state.reward_feed.notify_or_log(&observation).await;

    let message = if observation.complete {
        "Complete observation submitted"
    } else {
        "Observation submitted"
    };

    Ok(json_response(
        StatusCode::CREATED,
        &SubmissionResponse {
            message: message.into(),
            id: observation.id.clone(),
            valid: observation.valid,
            complete: observation.complete,
            observation,
        },
    ))
}

async fn handle_get(id: &str, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let id = path_segment(id)?;
    let observation = state
        .observations
        .get(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Observation not found: {}", id)))?;
    Ok(ok_json(&observation))
}

async fn handle_delete(id: &str, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let id = path_segment(id)?;
    if !state.observations.delete(&id).await? {
        return Err(ServiceError::NotFound(format!("Observation not found: {}", id)));
    }

    info!(observation_id = %id, "Observation deleted");
    Ok(ok_json(&MessageResponse {
        message: format!("Observation {} deleted", id),
    }))
}

async fn handle_count(raw_id: &str, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let citizen_id = citizen_from_path(raw_id)?;
    let count = state.observations.count_by_citizen(&citizen_id).await?;
    let valid_count = state.observations.count_valid_by_citizen(&citizen_id).await?;
    Ok(ok_json(&CountResponse { count, valid_count }))
}

async fn handle_list(segments: &[&str], state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let store = &state.observations;
    let observations = match segments {
        [] => store.list_all().await?,
        ["valid"] => store.list_valid().await?,
        ["recent"] => store.recent_valid(RECENT_OBSERVATIONS).await?,
        ["citizen", id] => store.list_by_citizen(&citizen_from_path(id)?).await?,
        ["citizen", id, "valid"] => store.list_valid_by_citizen(&citizen_from_path(id)?).await?,
        ["postcode", postcode] => {
            store
                .list_by_postcode(path_segment(postcode)?.trim())
                .await?
        }
        _ => return Err(ServiceError::NotFound("Observation endpoint not found".into())),
    };
    Ok(ok_json(&observations))
}

/// Paths answered with a list of observations
fn is_listing(segments: &[&str]) -> bool {
    matches!(
        segments,
        [] | ["valid"] | ["recent"] | ["citizen", _] | ["citizen", _, "valid"] | ["postcode", _]
    )
}

/// Route `/api/observations/*`, returning None for paths outside it
pub async fn handle_observation_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let rest = path.strip_prefix(OBSERVATIONS_PREFIX)?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let method = req.method().clone();

    let response = match (&method, segments.as_slice()) {
        (&Method::POST, []) => respond(handle_submit(req, state).await),
        (&Method::GET, ["citizen", id, "count"]) => respond(handle_count(id, state).await),
        (&Method::GET, listing) if is_listing(listing) => {
            respond(handle_list(&segments, state).await)
        }
        (&Method::GET, [id]) => respond(handle_get(id, state).await),
        (&Method::DELETE, [id]) if *id != "valid" && *id != "recent" => {
            respond(handle_delete(id, state).await)
        }

        (_, []) | (_, [_]) => method_not_allowed(),
        _ => not_found_response(&path),
    };

    Some(response)
}
