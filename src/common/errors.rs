//! Error types for the engine

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
///
/// The four kinds map one-to-one onto transport responses: validation →
/// bad request, conflict → 409/aborted, not-found → 404, storage → 500.
/// Storage errors are propagated unchanged and never retried by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller-supplied data or current aggregate state fails a precondition
    #[error("validation error: {0}")]
    Validation(String),

    /// Well-formed request that cannot proceed given concurrent or prior state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced entity does not exist or is soft-deleted
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying store failure, unrelated to business rules
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Shorthand for a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Shorthand for a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        EngineError::Conflict(msg.into())
    }

    /// Shorthand for a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    /// Whether the caller may safely retry after refreshing state
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}
