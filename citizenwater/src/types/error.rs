//! Error types for citizenwater services

use citizenwater_core::CoreError;
use hyper::StatusCode;

/// Main error type for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Gateway error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl ServiceError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to return to a client.
    ///
    /// Storage and internal failures are reported generically; the detail
    /// stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Database unavailable".to_string(),
            Self::Internal(_) | Self::Config(_) => "Internal server error".to_string(),
            Self::Auth(_) => "Authentication failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<hyper::Error> for ServiceError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for ServiceError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ServiceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCitizenId(msg) => Self::BadRequest(msg),
            CoreError::InvalidObservation(reason) => Self::BadRequest(reason.to_string()),
            CoreError::UnknownBadge(level) => {
                Self::BadRequest(format!("Invalid badge level: {}", level))
            }
            err @ (CoreError::PointsOutOfRange { .. } | CoreError::BatchTooLarge { .. }) => {
                Self::BadRequest(err.to_string())
            }
            CoreError::Storage(msg) => Self::Database(msg),
        }
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use citizenwater_core::ValidationFailure;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::Upstream("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ServiceError::Database("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ServiceError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_core_errors_map_to_bad_request() {
        let err: ServiceError =
            CoreError::InvalidObservation(ValidationFailure::MissingPostcode).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Postcode is required");

        let err: ServiceError = CoreError::BatchTooLarge { max: 1000 }.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_detail_is_hidden() {
        let err: ServiceError = CoreError::Storage("connection reset by 10.0.0.3".into()).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.public_message().contains("10.0.0.3"));
    }
}
