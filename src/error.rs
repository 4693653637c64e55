use thiserror::Error;

use crate::{dao::storage::StorageError, state::room::UserState};

/// Error surfaced to clients by the room services.
///
/// Each variant maps to a distinct wire-level code so clients can react
/// programmatically regardless of the human-readable message.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A precondition was violated: restricted user, already in a room,
    /// settings change during play, modified beatmap, and so on.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The operation is restricted to the room host.
    #[error("operation restricted to the room host")]
    NotHost,
    /// The caller has no active session bound to a room.
    #[error("user has not joined a room")]
    NotJoinedRoom,
    /// The requested per-user state transition is not in the allowed table.
    #[error("invalid state change from {from:?} to {to:?}")]
    InvalidStateChange { from: UserState, to: UserState },
    /// Internal consistency failure (a bug, not a client mistake).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// The persistence collaborator failed or timed out.
    #[error("storage error")]
    Storage(#[from] StorageError),
}

impl ServiceError {
    /// Stable wire-level code carried in error frames.
    pub fn wire_code(&self) -> &'static str {
        match self {
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::NotHost => "not_host",
            ServiceError::NotJoinedRoom => "not_joined_room",
            ServiceError::InvalidStateChange { .. } => "invalid_state_change",
            ServiceError::InvalidOperation(_) => "invalid_operation",
            ServiceError::Storage(_) => "storage_unavailable",
        }
    }
}
