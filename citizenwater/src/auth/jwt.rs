//! JWT token handling
//!
//! Tokens are HS256-signed and carry the username, citizen id and role.
//! There is no server-side session: logout is client-side and refresh simply
//! issues a new token for a still-valid one.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::UserRole;
use crate::types::ServiceError;

/// Secret used when dev mode runs without JWT_SECRET
const DEV_SECRET: &str = "citizenwater-dev-mode-secret-not-for-production";

/// Payload stored in a JWT token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub citizen_id: String,
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Input for creating a new token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub username: String,
    pub citizen_id: String,
    pub role: UserRole,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

fn unix_now() -> Result<u64, ServiceError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| ServiceError::Auth(format!("System time error: {}", e)))
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or shorter than 32 characters
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, ServiceError> {
        if secret.is_empty() {
            return Err(ServiceError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(ServiceError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Create a validator for dev mode with a fixed secret
    pub fn new_dev(expiry_seconds: u64) -> Self {
        Self {
            secret: DEV_SECRET.into(),
            expiry_seconds,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Generate a token for an authenticated user
    pub fn generate_token(&self, input: TokenInput) -> Result<String, ServiceError> {
        let now = unix_now()?;

        let claims = Claims {
            sub: input.username,
            citizen_id: input.citizen_id,
            role: input.role,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Verify and decode a token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }

    /// Seconds until the token expires, negative once it has
    pub fn get_token_time_remaining(&self, claims: &Claims) -> i64 {
        let now = unix_now().unwrap_or(0);
        claims.exp as i64 - now as i64
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
