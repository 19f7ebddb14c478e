//! Response helpers shared by every route module

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, warn};

use crate::auth::{extract_token_from_header, Claims};
use crate::server::AppState;
use crate::types::ServiceError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Error payload returned by every route
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Unix time in milliseconds
    pub timestamp: i64,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Convert a Full<Bytes> response to BoxBody
pub fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

pub fn ok_json<T: Serialize>(body: &T) -> Response<BoxBody> {
    json_response(StatusCode::OK, body)
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(status, &ErrorResponse::new(message))
}

/// Map a service error onto its status and public message
pub fn service_error_response(err: &ServiceError) -> Response<BoxBody> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(status = %status, "Request failed: {}", err);
    } else {
        warn!(status = %status, "Request rejected: {}", err);
    }
    error_response(status, err.public_message())
}

/// Unwrap a handler result into a response
pub fn respond(result: Result<Response<BoxBody>, ServiceError>) -> Response<BoxBody> {
    result.unwrap_or_else(|err| service_error_response(&err))
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "3600")
        .body(empty_body())
        .unwrap()
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    error_response(StatusCode::NOT_FOUND, format!("No route for {}", path))
}

pub fn method_not_allowed() -> Response<BoxBody> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Read the whole body, rejecting anything over [`MAX_BODY_BYTES`]
pub async fn read_body(req: Request<Incoming>) -> Result<Bytes, ServiceError> {
    let body = req
        .collect()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > MAX_BODY_BYTES {
        return Err(ServiceError::BadRequest("Request body too large".into()));
    }
    Ok(bytes)
}

pub async fn parse_json_body<T: DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, ServiceError> {
    let bytes = read_body(req).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Parse the query string, treating a missing one as empty
pub fn parse_query<T: DeserializeOwned>(req: &Request<Incoming>) -> Result<T, ServiceError> {
    serde_urlencoded::from_str(req.uri().query().unwrap_or(""))
        .map_err(|e| ServiceError::BadRequest(format!("Invalid query parameters: {}", e)))
}

pub fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Decode a percent-encoded path segment
pub fn path_segment(raw: &str) -> Result<String, ServiceError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|_| ServiceError::BadRequest("Malformed path segment".into()))
}

/// Verified claims from the bearer token
pub fn bearer_claims(req: &Request<Incoming>, state: &AppState) -> Result<Claims, ServiceError> {
    let token = extract_token_from_header(get_auth_header(req))
        .ok_or_else(|| ServiceError::Unauthorized("No token provided".into()))?;

    let result = state.jwt.verify_token(token);
    match result.claims {
        Some(claims) if result.valid => Ok(claims),
        _ => Err(ServiceError::Unauthorized(
            result.error.unwrap_or_else(|| "Invalid token".into()),
        )),
    }
}

/// Admin-only operations are open in dev mode
pub fn require_admin(req: &Request<Incoming>, state: &AppState) -> Result<(), ServiceError> {
    if state.args.dev_mode {
        return Ok(());
    }

    let claims = bearer_claims(req, state)?;
    if !claims.role.is_admin() {
        return Err(ServiceError::Forbidden("Admin role required".into()));
    }
    Ok(())
}
