//! Health check endpoint
//!
//! `/health` and `/healthz` report the role this process serves, the store
//! backend in use and how long it has been up. Always 200 while the process
//! is running; the gateway uses it to probe upstream services.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub role: String,
    /// "mongodb" or "memory"
    pub backend: &'static str,
    pub uptime_seconds: u64,
    pub version: &'static str,
    pub commit: &'static str,
    pub mode: &'static str,
    pub timestamp: String,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "UP",
        service: format!("citizenwater-{}", state.args.role),
        role: state.args.role.to_string(),
        backend: state.backend,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"status":"UP","error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
