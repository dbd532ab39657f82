//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Network-level failure (connection refused, DNS resolution, ...)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The backend did not answer in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The backend answered with a non-success HTTP status
    #[error("Backend returned HTTP {status}")]
    HttpStatus { status: u16 },

    /// Serialization / deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A field referenced by position or name does not exist
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Malformed collaborator configuration (backend path, base URL, ...)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CoreError {
    /// Whether the error is expected behavior (stale field references, user
    /// input) and should be logged at `warn` rather than `error` level.
    ///
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::FieldNotFound(_))
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
