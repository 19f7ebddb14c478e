//! HTTP Routes for the reward ledger and leaderboard
//!
//! Citizen rows:
//! - GET    /api/rewards/citizen/{id}                       - Get or create a row
//! - POST   /api/rewards/citizen                            - Create a row
//! - DELETE /api/rewards/citizen/{id}                       - Delete a row (admin)
//! - GET    /api/rewards/all                                - Every row
//! - POST   /api/rewards/citizen/{id}/observation           - Credit one observation
//! - POST   /api/rewards/citizen/{id}/observations/batch    - Credit several observations
//! - POST   /api/rewards/citizen/{id}/calculate             - Rebuild from observations
//! - POST   /api/rewards/refresh                            - Rebuild every citizen
//! - DELETE /api/rewards/clear                              - Drop every row (admin)
//!
//! Ranking:
//! - GET /api/rewards/leaderboard[?limit=N], /leaderboard/top3, /leaderboard/full
//! - GET /api/rewards/citizen/{id}/rank
//! - GET /api/rewards/badge/{level}
//! - GET /api/rewards/filter/points?minPoints=, /filter/observations?minObservations=
//! - GET /api/rewards/statistics, /statistics/badges
//!
//! Admin adjustments:
//! - POST /api/rewards/citizen/{id}/points, /reward, /reset

use citizenwater_core::{
    Badge, CitizenId, RewardAdjustment, DEFAULT_TOP_N, MAX_BATCH_OBSERVATIONS,
};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::common::{
    json_response, method_not_allowed, not_found_response, ok_json, parse_json_body,
    parse_query, path_segment, require_admin, respond, BoxBody, MessageResponse,
};
use crate::server::AppState;
use crate::types::{Result, ServiceError};

pub const REWARDS_PREFIX: &str = "/api/rewards";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfileRequest {
    #[serde(default)]
    citizen_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationEvent {
    #[serde(default)]
    is_complete: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    valid_count: i64,
    #[serde(default)]
    complete_count: i64,
}

#[derive(Debug, Deserialize)]
struct PointsRequest {
    #[serde(default)]
    points: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardQuery {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    top_n: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinPointsQuery {
    #[serde(default)]
    min_points: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinObservationsQuery {
    #[serde(default)]
    min_observations: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RankResponse {
    citizen_id: String,
    rank: usize,
    total_citizens: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    message: String,
    citizens_updated: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearResponse {
    message: String,
    removed: usize,
}

// =============================================================================
// Request checks
// =============================================================================

fn citizen_from_path(raw: &str) -> Result<CitizenId> {
    Ok(CitizenId::parse(&path_segment(raw)?)?)
}

/// Leaderboard size from `limit`, falling back to `topN` and then the default
fn leaderboard_limit(query: &LeaderboardQuery) -> Result<usize> {
    match query.limit.or(query.top_n) {
        None => Ok(DEFAULT_TOP_N),
        Some(n) if n <= 0 => Err(ServiceError::BadRequest(
            "Leaderboard limit must be positive".into(),
        )),
        Some(n) => Ok(usize::try_from(n).unwrap_or(usize::MAX)),
    }
}

fn batch_counts(body: &BatchRequest) -> Result<(u32, u32)> {
    if body.valid_count < 0 || body.complete_count < 0 {
        return Err(ServiceError::BadRequest(
            "Observation counts cannot be negative".into(),
        ));
    }
    if body.complete_count > body.valid_count {
        return Err(ServiceError::BadRequest(
            "completeCount cannot exceed validCount".into(),
        ));
    }

    match (u32::try_from(body.valid_count), u32::try_from(body.complete_count)) {
        (Ok(valid), Ok(complete)) if valid <= MAX_BATCH_OBSERVATIONS => Ok((valid, complete)),
        _ => Err(ServiceError::BadRequest(format!(
            "validCount cannot exceed {}",
            MAX_BATCH_OBSERVATIONS
        ))),
    }
}

fn positive_points(points: Option<i64>) -> Result<i64> {
    match points {
        Some(p) if p > 0 => Ok(p),
        Some(_) => Err(ServiceError::BadRequest("Points must be positive".into())),
        None => Err(ServiceError::BadRequest("Points are required".into())),
    }
}

fn non_negative(value: Option<i64>, name: &str) -> Result<i64> {
    match value {
        Some(v) if v >= 0 => Ok(v),
        Some(_) => Err(ServiceError::BadRequest(format!("{} cannot be negative", name))),
        None => Err(ServiceError::BadRequest(format!("{} is required", name))),
    }
}

// =============================================================================
// Citizen rows
// =============================================================================

async fn handle_get_citizen(raw_id: &str, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let citizen_id = citizen_from_path(raw_id)?;
    Ok(ok_json(&state.ledger.get_or_create(&citizen_id).await?))
}

async fn handle_create_profile(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let body: CreateProfileRequest = parse_json_body(req).await?;
    let citizen_id = CitizenId::parse(&body.citizen_id)?;

    let (reward, created) = state.ledger.create_profile(&citizen_id).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok(json_response(status, &reward))
}

async fn handle_delete_citizen(
    raw_id: &str,
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    require_admin(&req, &state)?;
    let citizen_id = citizen_from_path(raw_id)?;

    if !state.ledger.delete(&citizen_id).await? {
        return Err(ServiceError::NotFound(format!(
            "No rewards found for citizen {}",
            citizen_id
        )));
    }

    info!(citizen_id = %citizen_id, "Deleted reward profile");
    Ok(ok_json(&MessageResponse {
        message: format!("Rewards deleted for citizen {}", citizen_id),
    }))
}

async fn handle_all(state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.full()))
}

async fn handle_observation(
    raw_id: &str,
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let citizen_id = citizen_from_path(raw_id)?;
    let event: ObservationEvent = parse_json_body(req).await?;
    let reward = state
        .ledger
        .record_observation(&citizen_id, event.is_complete)
        .await?;
    Ok(ok_json(&reward))
}

async fn handle_batch(
    raw_id: &str,
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let citizen_id = citizen_from_path(raw_id)?;
    let body: BatchRequest = parse_json_body(req).await?;
    let (valid, complete) = batch_counts(&body)?;

    let reward = state.ledger.record_batch(&citizen_id, valid, complete).await?;
    Ok(ok_json(&reward))
}

async fn handle_calculate(raw_id: &str, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let citizen_id = citizen_from_path(raw_id)?;
    let observations = state.observation_source.valid_by_citizen(&citizen_id).await?;

    let flags: Vec<bool> = observations.iter().map(|o| o.complete).collect();
    let reward = state.ledger.rebuild(&citizen_id, &flags).await?;

    info!(
        citizen_id = %citizen_id,
        observations = flags.len(),
        total_points = reward.total_points,
        "Recalculated rewards"
    );
    Ok(ok_json(&reward))
}

async fn handle_refresh(state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let observations = state.observation_source.all_valid().await?;

    let mut by_citizen: BTreeMap<CitizenId, Vec<bool>> = BTreeMap::new();
    for observation in observations {
        by_citizen
            .entry(observation.citizen_id)
            .or_default()
            .push(observation.complete);
    }

    for (citizen_id, flags) in &by_citizen {
        state.ledger.rebuild(citizen_id, flags).await?;
    }

    info!(citizens = by_citizen.len(), "Refreshed reward ledger");
    Ok(ok_json(&RefreshResponse {
        message: "Rewards refreshed from observations".into(),
        citizens_updated: by_citizen.len(),
    }))
}

async fn handle_clear(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    require_admin(&req, &state)?;
    let removed = state.ledger.clear_all().await?;
    Ok(ok_json(&ClearResponse {
        message: "All rewards cleared".into(),
        removed,
    }))
}

// =============================================================================
// Ranking
// =============================================================================

async fn handle_leaderboard(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let query: LeaderboardQuery = parse_query(&req)?;
    let limit = leaderboard_limit(&query)?;
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.top_n(limit)))
}

async fn handle_top3(state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.top_n(3)))
}

async fn handle_rank(raw_id: &str, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let citizen_id = citizen_from_path(raw_id)?;
    let leaderboard = state.ledger.leaderboard().await?;

    let rank = leaderboard.rank_of(&citizen_id).ok_or_else(|| {
        ServiceError::NotFound(format!("Citizen {} is not on the leaderboard", citizen_id))
    })?;

    Ok(ok_json(&RankResponse {
        citizen_id: citizen_id.to_string(),
        rank,
        total_citizens: leaderboard.len(),
    }))
}

async fn handle_badge(raw_level: &str, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let badge: Badge = path_segment(raw_level)?.parse()?;
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.by_badge(badge)))
}

async fn handle_min_points(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let query: MinPointsQuery = parse_query(&req)?;
    let min_points = non_negative(query.min_points, "minPoints")?;
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.with_min_points(min_points)))
}

async fn handle_min_observations(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let query: MinObservationsQuery = parse_query(&req)?;
    let min = non_negative(query.min_observations, "minObservations")?;
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.with_min_observations(min as u64)))
}

async fn handle_statistics(state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.statistics()))
}

async fn handle_badge_statistics(state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let leaderboard = state.ledger.leaderboard().await?;
    Ok(ok_json(&leaderboard.badge_distribution()))
}

// =============================================================================
// Admin adjustments
// =============================================================================

async fn handle_add_points(
    raw_id: &str,
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    require_admin(&req, &state)?;
    let citizen_id = citizen_from_path(raw_id)?;
    let body: PointsRequest = parse_json_body(req).await?;
    let points = positive_points(body.points)?;

    Ok(ok_json(&state.ledger.add_points(&citizen_id, points).await?))
}

async fn handle_process_reward(
    raw_id: &str,
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    require_admin(&req, &state)?;
    let citizen_id = citizen_from_path(raw_id)?;
    let adjustment: RewardAdjustment = parse_json_body(req).await?;
    positive_points(Some(adjustment.points))?;

    Ok(ok_json(&state.ledger.process_reward(&citizen_id, &adjustment).await?))
}

async fn handle_reset(
    raw_id: &str,
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    require_admin(&req, &state)?;
    let citizen_id = citizen_from_path(raw_id)?;
    Ok(ok_json(&state.ledger.reset(&citizen_id).await?))
}

/// Route `/api/rewards/*`, returning None for paths outside it
pub async fn handle_rewards_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let rest = path.strip_prefix(REWARDS_PREFIX)?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let method = req.method().clone();

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, ["citizen"]) => handle_create_profile(req, state).await,
        (&Method::GET, ["citizen", id]) => handle_get_citizen(id, state).await,
        (&Method::DELETE, ["citizen", id]) => handle_delete_citizen(id, req, state).await,
        (&Method::GET, ["all"]) => handle_all(state).await,

        (&Method::POST, ["citizen", id, "observation"]) => handle_observation(id, req, state).await,
        (&Method::POST, ["citizen", id, "observations", "batch"]) => {
            handle_batch(id, req, state).await
        }
        (&Method::POST, ["citizen", id, "calculate"]) => handle_calculate(id, state).await,
        (&Method::POST, ["refresh"]) => handle_refresh(state).await,
        (&Method::DELETE, ["clear"]) => handle_clear(req, state).await,

        (&Method::GET, ["leaderboard"]) => handle_leaderboard(req, state).await,
        (&Method::GET, ["leaderboard", "top3"]) => handle_top3(state).await,
        (&Method::GET, ["leaderboard", "full"]) => handle_all(state).await,
        (&Method::GET, ["citizen", id, "rank"]) => handle_rank(id, state).await,
        (&Method::GET, ["badge", level]) => handle_badge(level, state).await,
        (&Method::GET, ["filter", "points"]) => handle_min_points(req, state).await,
        (&Method::GET, ["filter", "observations"]) => handle_min_observations(req, state).await,
        (&Method::GET, ["statistics"]) => handle_statistics(state).await,
        (&Method::GET, ["statistics", "badges"]) => handle_badge_statistics(state).await,

        (&Method::POST, ["citizen", id, "points"]) => handle_add_points(id, req, state).await,
        (&Method::POST, ["citizen", id, "reward"]) => handle_process_reward(id, req, state).await,
        (&Method::POST, ["citizen", id, "reset"]) => handle_reset(id, req, state).await,

        (_, ["citizen", ..]) | (_, ["all" | "refresh" | "clear" | "statistics"]) => {
            return Some(method_not_allowed())
        }
        _ => return Some(not_found_response(&path)),
    };

    Some(respond(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaderboard_limit() {
        let query = LeaderboardQuery::default();
        assert_eq!(leaderboard_limit(&query).unwrap(), DEFAULT_TOP_N);

        let query = LeaderboardQuery { limit: None, top_n: Some(3) };
        assert_eq!(leaderboard_limit(&query).unwrap(), 3);

        let query = LeaderboardQuery { limit: Some(5), top_n: Some(3) };
        assert_eq!(leaderboard_limit(&query).unwrap(), 5);

        let query = LeaderboardQuery { limit: Some(0), top_n: None };
        assert!(leaderboard_limit(&query).is_err());
    }

    #[test]
    fn test_batch_counts() {
        let body = |valid, complete| BatchRequest {
            valid_count: valid,
            complete_count: complete,
        };
        assert_eq!(batch_counts(&body(3, 1)).unwrap(), (3, 1));
        assert!(batch_counts(&body(-1, 0)).is_err());
        assert!(batch_counts(&body(1, 2)).is_err());

        let max = i64::from(MAX_BATCH_OBSERVATIONS);
        assert!(batch_counts(&body(max, max)).is_ok());
        assert!(batch_counts(&body(max + 1, 0)).is_err());
        assert!(batch_counts(&body(i64::from(u32::MAX), 0)).is_err());
    }

    #[test]
    fn test_point_checks() {
        assert_eq!(positive_points(Some(25)).unwrap(), 25);
        assert!(positive_points(Some(0)).is_err());
        assert!(positive_points(None).is_err());

        assert_eq!(non_negative(Some(0), "minPoints").unwrap(), 0);
        assert!(non_negative(Some(-5), "minPoints").is_err());
        assert!(non_negative(None, "minPoints").is_err());
    }

    #[test]
    fn test_leaderboard_query_parsing() {
        let query: LeaderboardQuery = serde_urlencoded::from_str("topN=4").unwrap();
        assert_eq!(query.top_n, Some(4));
        let query: MinObservationsQuery = serde_urlencoded::from_str("minObservations=2").unwrap();
        assert_eq!(query.min_observations, Some(2));
    }
}
