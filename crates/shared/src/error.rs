//! Application-wide error types.
//!
//! Domain crates define their own `thiserror` enums and convert into
//! `AppError` at the boundary to an outer surface (CLI, HTTP, queue worker).

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Actor is not entitled to perform the operation.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource is not in a state compatible with the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Conflict (e.g., a concurrent modification).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistence layer error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// External collaborator error (notifications, queues).
    #[error("Integration error: {0}")]
    Integration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::InvalidState(_) => 422,
            Self::Conflict(_) => 409,
            Self::Integration(_) => 502,
            Self::Storage(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Integration(_) => "INTEGRATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
