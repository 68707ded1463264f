//! Shared error taxonomy for the domain and event-reaction layers.
//!
//! One enum, not one per aggregate: every caller in this crate needs to
//! distinguish the same handful of kinds, and handlers
//! match on them to decide fatal-vs-logged-and-continue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailure(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Partial failures are any non-fatal kind: the caller logs
    /// and continues rather than aborting sibling work.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::Fatal(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
