//! Domain error model for business commands.

use thiserror::Error;

/// Result type used by command implementations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error raised by command logic.
///
/// Keep this focused on deterministic business failures. Dispatch, middleware
/// and history failures have their own error types in `keel-bus`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input was well-formed but not acceptable (e.g. malformed email).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The targeted record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with current state (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor is not allowed to perform the operation.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
