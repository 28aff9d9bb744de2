//! Shared primitives for all Rust crates in Tablegate.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used across Tablegate crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller could not be authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Mutation attempted on a permission grant that is no longer active.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Update requested without any effective change.
    #[error("nothing changed: {0}")]
    NothingChanged(String),

    /// Delete attempted on a permission grant that is still active.
    #[error("delete of active grant: {0}")]
    DeleteOfActiveGrant(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
