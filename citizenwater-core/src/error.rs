//! Error types for the citizen water domain core

/// Why a submitted observation was rejected.
///
/// The messages are returned to citizens as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("Citizen ID is required")]
    MissingCitizenId,

    #[error("Postcode is required")]
    MissingPostcode,

    #[error("At least one measurement or observation note is required")]
    NoMeasurementOrNote,
}

/// Main error type for core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid citizen id: {0}")]
    InvalidCitizenId(String),

    #[error("Invalid observation: {0}")]
    InvalidObservation(ValidationFailure),

    #[error("Unknown badge level: {0}")]
    UnknownBadge(String),

    #[error("Adding {delta} points to {total} leaves the valid point range")]
    PointsOutOfRange { total: i64, delta: i64 },

    #[error("A batch may credit at most {max} observations")]
    BatchTooLarge { max: u32 },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ValidationFailure> for CoreError {
    fn from(failure: ValidationFailure) -> Self {
        Self::InvalidObservation(failure)
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
