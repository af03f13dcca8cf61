//! Crate-wide error taxonomy
//!
//! One flat enum shared by the stores, the reconciler, and the lifecycle
//! service. Callers branch on the variant, never on message text:
//! - `Validation` / `Forbidden` / `NotFound` surface synchronously and are
//!   never retried
//! - `Conflict` marks an exhausted optimistic-retry loop; the operation is
//!   safe to re-run
//! - `PreconditionFailed` marks a state-gated refusal (e.g. deleting a
//!   category that still carries complaints)
//! - `InvalidTransition` carries the rejected status edge
//! - `UploadFailed` is the one collaborator failure that aborts creation

use thiserror::Error;
use uuid::Uuid;

use crate::db::schemas::Status;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, RedressError>;

#[derive(Debug, Error)]
pub enum RedressError {
    /// Input rejected before any write happened
    #[error("validation failed: {0}")]
    Validation(String),

    /// Entity does not exist, or the principal may not learn that it does
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation, or an optimistic write that exhausted its
    /// retry budget
    #[error("conflict: {0}")]
    Conflict(String),

    /// The entity exists but its current state forbids the operation
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The principal is not permitted to perform the operation
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The status state machine has no edge from `from` to `to`
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    /// A required attachment upload failed; filing is aborted
    #[error("attachment upload failed: {0}")]
    UploadFailed(String),
}

impl RedressError {
    /// `NotFound` for an entity addressed by id
    pub fn not_found(entity: &str, id: Uuid) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }
}
