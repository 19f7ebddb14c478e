//! HTTP Routes for Authentication
//!
//! Provides REST API endpoints for citizen accounts:
//! - POST /api/auth/register        - Create an account and get a JWT token
//! - POST /api/auth/login           - Authenticate by username or email
//! - POST /api/auth/refresh         - Issue a fresh token for a valid one
//! - POST /api/auth/validate        - Check a token
//! - POST /api/auth/logout          - Client-side logout acknowledgement
//! - GET  /api/auth/me              - Current user from the bearer token
//! - GET  /api/auth/check-username  - Username availability
//! - GET  /api/auth/check-email     - Email availability
//! - GET  /api/auth/health          - Liveness

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::common::{
    bearer_claims, get_auth_header, json_response, method_not_allowed, not_found_response,
    ok_json, parse_json_body, parse_query, read_body, respond, BoxBody, MessageResponse,
};
use crate::auth::{
    users, extract_token_from_header, hash_password, normalize_email, verify_password, Claims,
    TokenInput, UserRecord, MIN_PASSWORD_LEN,
};
use crate::server::AppState;
use crate::types::{Result, ServiceError};

pub const AUTH_PREFIX: &str = "/api/auth";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub username: String,
    pub email: String,
    pub role: String,
    pub citizen_id: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    citizen_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    citizen_id: String,
    username: String,
    email: String,
    full_name: Option<String>,
    role: String,
    is_active: bool,
    /// Seconds left on the presented token
    token_validity: i64,
}

#[derive(Debug, Deserialize)]
struct UsernameQuery {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Serialize)]
struct UsernameAvailability {
    username: String,
    available: bool,
}

#[derive(Debug, Serialize)]
struct EmailAvailability {
    email: String,
    available: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub service: &'static str,
}

// =============================================================================
// Helpers
// =============================================================================

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthorized("Invalid username or password".into())
}

fn auth_response(state: &AppState, user: &UserRecord) -> Result<AuthResponse> {
    let token = state.jwt.generate_token(TokenInput {
        username: user.username.clone(),
        citizen_id: user.citizen_id.clone(),
        role: user.role,
    })?;

    Ok(AuthResponse {
        token,
        token_type: "Bearer",
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role.to_string(),
        citizen_id: user.citizen_id.clone(),
        expires_in: state.jwt.expiry_seconds(),
    })
}

fn validate_registration(body: &RegisterRequest) -> Result<()> {
    if body.username.trim().is_empty() {
        return Err(ServiceError::BadRequest("Username is required".into()));
    }
    if body.email.trim().is_empty() || !body.email.contains('@') {
        return Err(ServiceError::BadRequest("A valid email is required".into()));
    }
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(ServiceError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

async fn handle_register(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let body: RegisterRequest = parse_json_body(req).await?;
    validate_registration(&body)?;

    let username = body.username.trim().to_string();
    if state.users.username_exists(&username).await? {
        return Err(users::username_taken());
    }
    if state.users.email_exists(&body.email).await? {
        return Err(users::email_taken());
    }

    let password_hash = hash_password(&body.password)?;
    let user = UserRecord::new_citizen(username, body.email, password_hash, body.full_name);
    state.users.insert(user.clone()).await?;

    info!(username = %user.username, citizen_id = %user.citizen_id, "Registered user");
    Ok(json_response(StatusCode::CREATED, &auth_response(&state, &user)?))
}

async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let body: LoginRequest = parse_json_body(req).await?;

    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ServiceError::BadRequest(
            "Missing required fields: username, password".into(),
        ));
    }

    let user = match state.users.find_by_login(body.username.trim()).await? {
        Some(user) if user.is_active => user,
        _ => {
            warn!(login = %body.username, "Login failed: unknown or inactive user");
            return Err(invalid_credentials());
        }
    };

    if !verify_password(&body.password, &user.password_hash)? {
        warn!(username = %user.username, "Login failed: wrong password");
        return Err(invalid_credentials());
    }

    info!(username = %user.username, "User logged in");
    Ok(ok_json(&auth_response(&state, &user)?))
}

async fn handle_refresh(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let header_token = extract_token_from_header(get_auth_header(&req)).map(str::to_string);

    let bytes = read_body(req).await?;
    let body: RefreshRequest = if bytes.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let token = body
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .or(header_token)
        .ok_or_else(|| ServiceError::Unauthorized("No token provided".into()))?;

    let result = state.jwt.verify_token(&token);
    let claims = match result.claims {
        Some(claims) if result.valid => claims,
        _ => {
            return Err(ServiceError::Unauthorized(
                result.error.unwrap_or_else(|| "Invalid token".into()),
            ))
        }
    };

    let user = state
        .users
        .find_by_username(&claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ServiceError::Unauthorized("User no longer exists".into()))?;

    Ok(ok_json(&auth_response(&state, &user)?))
}

async fn handle_validate(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let body: ValidateRequest = parse_json_body(req).await?;
    let result = state.jwt.verify_token(body.token.trim());

    let response = match result.claims {
        Some(claims) if result.valid => ValidateResponse {
            valid: true,
            expires_in: Some(state.jwt.get_token_time_remaining(&claims)),
            username: Some(claims.sub),
            citizen_id: Some(claims.citizen_id),
            role: Some(claims.role.to_string()),
            error: None,
        },
        _ => {
            return Ok(json_response(
                StatusCode::UNAUTHORIZED,
                &ValidateResponse {
                    valid: false,
                    username: None,
                    citizen_id: None,
                    role: None,
                    expires_in: None,
                    error: result.error,
                },
            ))
        }
    };

    Ok(ok_json(&response))
}

fn handle_logout() -> Response<BoxBody> {
    // Tokens are stateless, the client discards its copy
    ok_json(&MessageResponse {
        message: "Logged out successfully".into(),
    })
}

async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Result<Response<BoxBody>> {
    let claims: Claims = bearer_claims(&req, &state)?;

    let user = state
        .users
        .find_by_username(&claims.sub)
        .await?
        .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;

    Ok(ok_json(&MeResponse {
        citizen_id: user.citizen_id,
        username: user.username,
        email: user.email,
        full_name: user.full_name,
        role: user.role.to_string(),
        is_active: user.is_active,
        token_validity: state.jwt.get_token_time_remaining(&claims),
    }))
}

async fn handle_check_username(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let query: UsernameQuery = parse_query(&req)?;
    let username = query.username.trim().to_string();
    if username.is_empty() {
        return Err(ServiceError::BadRequest("username query parameter is required".into()));
    }

    let available = !state.users.username_exists(&username).await?;
    Ok(ok_json(&UsernameAvailability { username, available }))
}

async fn handle_check_email(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>> {
    let query: EmailQuery = parse_query(&req)?;
    let email = normalize_email(&query.email);
    if email.is_empty() {
        return Err(ServiceError::BadRequest("email query parameter is required".into()));
    }

    let available = !state.users.email_exists(&email).await?;
    Ok(ok_json(&EmailAvailability { email, available }))
}

/// Route `/api/auth/*`, returning None for paths outside it
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let Some(rest) = path.strip_prefix(AUTH_PREFIX) else {
        return None;
    };
    let rest = rest.trim_end_matches('/').to_string();
    let method = req.method().clone();

    let response = match (&method, rest.as_str()) {
        (&Method::POST, "/register") => respond(handle_register(req, state).await),
        (&Method::POST, "/login") => respond(handle_login(req, state).await),
        (&Method::POST, "/refresh") => respond(handle_refresh(req, state).await),
        (&Method::POST, "/validate") => respond(handle_validate(req, state).await),
        (&Method::POST, "/logout") => handle_logout(),
        (&Method::GET, "/me") => respond(handle_me(req, state).await),
        (&Method::GET, "/check-username") => respond(handle_check_username(req, state).await),
        (&Method::GET, "/check-email") => respond(handle_check_email(req, state).await),
        (&Method::GET, "/health") => ok_json(&ServiceHealth {
            status: "UP",
            service: "auth-service",
        }),

        (_, "/register")
        | (_, "/login")
        | (_, "/refresh")
        | (_, "/validate")
        | (_, "/logout")
        | (_, "/me")
        | (_, "/check-username")
        | (_, "/check-email")
        | (_, "/health") => method_not_allowed(),

        _ => not_found_response(&path),
    };

    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            full_name: None,
        }
    }

    #[test]
    fn test_registration_rules() {
        let valid = register("alice", "alice@example.org", "long-enough");
        assert!(validate_registration(&valid).is_ok());
        assert!(validate_registration(&register(" ", "alice@example.org", "long-enough")).is_err());
        assert!(validate_registration(&register("alice", "not-an-email", "long-enough")).is_err());
        assert!(validate_registration(&register("alice", "alice@example.org", "short")).is_err());
    }

    #[test]
    fn test_auth_response_shape() {
        let response = AuthResponse {
            token: "t".into(),
            token_type: "Bearer",
            username: "alice".into(),
            email: "alice@example.org".into(),
            role: "CITIZEN".into(),
            citizen_id: "c-1".into(),
            expires_in: 3600,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "Bearer");
        assert_eq!(json["citizenId"], "c-1");
        assert_eq!(json["role"], "CITIZEN");
    }

    #[test]
    fn test_refresh_body_is_optional() {
        let body: RefreshRequest = serde_json::from_str("{}").unwrap();
        assert!(body.refresh_token.is_none());

        let body: RefreshRequest = serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(body.refresh_token.as_deref(), Some("abc"));
    }
}
