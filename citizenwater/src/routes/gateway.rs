//! Gateway routes
//!
//! `/gateway/{auth,observations,rewards}/**` map onto the matching service's
//! `/api/**` tree. A gateway-only process forwards over HTTP; a combined
//! process rewrites the path and answers locally.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::common::{error_response, ok_json, to_boxed, BoxBody, MAX_BODY_BYTES};
use crate::server::AppState;

pub const GATEWAY_PREFIX: &str = "/gateway";

/// Services reachable through the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Auth,
    Observations,
    Rewards,
}

impl Upstream {
    const ALL: [Upstream; 3] = [Upstream::Auth, Upstream::Observations, Upstream::Rewards];

    fn gateway_segment(self) -> &'static str {
        match self {
            Upstream::Auth => "auth",
            Upstream::Observations => "observations",
            Upstream::Rewards => "rewards",
        }
    }

    /// Base URL configured for this upstream
    pub fn base_url(self, state: &AppState) -> Option<&str> {
        let url = match self {
            Upstream::Auth => &state.args.auth_url,
            Upstream::Observations => &state.args.observations_url,
            Upstream::Rewards => &state.args.rewards_url,
        };
        url.as_deref()
    }
}

/// Map a gateway path onto its upstream and `/api/...` path
pub fn rewrite_path(path: &str) -> Option<(Upstream, String)> {
    let rest = path.strip_prefix(GATEWAY_PREFIX)?.strip_prefix('/')?;

    Upstream::ALL.into_iter().find_map(|upstream| {
        let segment = upstream.gateway_segment();
        let tail = rest.strip_prefix(segment)?;
        if tail.is_empty() || tail.starts_with('/') {
            Some((upstream, format!("/api/{}{}", segment, tail)))
        } else {
            None
        }
    })
}

/// Rewritten path and query for local dispatch
pub fn local_uri(req: &Request<Incoming>) -> Option<hyper::Uri> {
    let (_, api_path) = rewrite_path(req.uri().path())?;
    let path_and_query = match req.uri().query() {
        Some(q) => format!("{}?{}", api_path, q),
        None => api_path,
    };
    path_and_query.parse().ok()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayHealth {
    pub gateway: &'static str,
    pub auth_service: &'static str,
    pub observation_service: &'static str,
    pub rewards_service: &'static str,
}

fn up_or_down(up: bool) -> &'static str {
    if up {
        "UP"
    } else {
        "DOWN"
    }
}

async fn probe(state: &AppState, upstream: Upstream) -> bool {
    let Some(base) = upstream.base_url(state) else {
        return false;
    };
    let url = format!("{}/health", base.trim_end_matches('/'));

    match state.http.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!(url = %url, error = %e, "Health probe failed");
            false
        }
    }
}

/// `GET /gateway/health`
pub async fn gateway_health(state: Arc<AppState>) -> Response<BoxBody> {
    let health = if state.args.role.serves_auth() {
        // Combined process: every service is answered here
        GatewayHealth {
            gateway: "UP",
            auth_service: "UP",
            observation_service: "UP",
            rewards_service: "UP",
        }
    } else {
        let (auth, observations, rewards) = tokio::join!(
            probe(&state, Upstream::Auth),
            probe(&state, Upstream::Observations),
            probe(&state, Upstream::Rewards),
        );
        GatewayHealth {
            gateway: "UP",
            auth_service: up_or_down(auth),
            observation_service: up_or_down(observations),
            rewards_service: up_or_down(rewards),
        }
    };

    ok_json(&health)
}

/// Forward a gateway request to its upstream service
pub async fn forward_request(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let path = req.uri().path().to_string();
    let Some((upstream, api_path)) = rewrite_path(&path) else {
        return error_response(StatusCode::NOT_FOUND, format!("No route for {}", path));
    };
    let Some(base) = upstream.base_url(&state) else {
        return error_response(
            StatusCode::BAD_GATEWAY,
            format!("Gateway error: {:?} service is not configured", upstream),
        );
    };

    let endpoint = format!("{}{}", base.trim_end_matches('/'), api_path);
    let full_url = match req.uri().query() {
        Some(q) => format!("{}?{}", endpoint, q),
        None => endpoint,
    };

    let method = req.method().clone();
    debug!(method = %method, url = %full_url, "Forwarding gateway request");

    let client = &state.http;
    let mut builder = match method {
        Method::GET => client.get(&full_url),
        Method::POST => client.post(&full_url),
        Method::PUT => client.put(&full_url),
        Method::DELETE => client.delete(&full_url),
        Method::PATCH => client.patch(&full_url),
        _ => return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    };

    // Forward content-type header if present
    if let Some(ct) = req.headers().get("content-type") {
        if let Ok(ct_str) = ct.to_str() {
            builder = builder.header("Content-Type", ct_str);
        }
    }

    // Forward authorization header if present
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            builder = builder.header("Authorization", auth_str);
        }
    }

    if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        match req.collect().await {
            Ok(collected) => {
                let body_bytes = collected.to_bytes();
                if body_bytes.len() > MAX_BODY_BYTES {
                    return error_response(StatusCode::BAD_REQUEST, "Request body too large");
                }
                builder = builder.body(body_bytes);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read request body: {}", e),
                );
            }
        }
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, url = %full_url, "Failed to reach upstream");
            return error_response(StatusCode::BAD_GATEWAY, format!("Gateway error: {}", e));
        }
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    match response.bytes().await {
        Ok(body) => {
            info!(status = %status, size = body.len(), path = %path, "Forwarded gateway response");

            to_boxed(
                Response::builder()
                    .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK))
                    .header("Content-Type", content_type)
                    .header("Access-Control-Allow-Origin", "*")
                    .body(Full::new(Bytes::from(body.to_vec())))
                    .unwrap(),
            )
        }
        Err(e) => {
            warn!(error = %e, "Failed to read upstream response body");
            error_response(StatusCode::BAD_GATEWAY, format!("Gateway error: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_path() {
        assert_eq!(
            rewrite_path("/gateway/rewards/leaderboard"),
            Some((Upstream::Rewards, "/api/rewards/leaderboard".to_string()))
        );
        assert_eq!(
            rewrite_path("/gateway/observations"),
            Some((Upstream::Observations, "/api/observations".to_string()))
        );
        assert_eq!(
            rewrite_path("/gateway/auth/login"),
            Some((Upstream::Auth, "/api/auth/login".to_string()))
        );
    }

    #[test]
    fn test_rewrite_rejects_lookalikes() {
        assert_eq!(rewrite_path("/gateway/rewardsx/all"), None);
        assert_eq!(rewrite_path("/gateway/health"), None);
        assert_eq!(rewrite_path("/api/rewards/all"), None);
        assert_eq!(rewrite_path("/gatewayrewards"), None);
    }
}
