//! Common error types used across the workspace.
//!
//! Each failure kind is its own typed error, lifted into [`WalkinError`] via
//! `#[from]`. Adapters box their own errors into [`WalkinError::Storage`].

use crate::entry::EntryStatus;

/// Top-level error returned by domain commands and application services.
#[derive(Debug, thiserror::Error)]
pub enum WalkinError {
    /// Malformed or missing input.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgumentError),

    /// The command is forbidden in the current state.
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    /// The queue is full.
    #[error(transparent)]
    CapacityExceeded(#[from] CapacityExceededError),

    /// The referenced queue or entry does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The aggregate changed since it was loaded.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// The persistence layer failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of a [`WalkinError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    CapacityExceeded,
    NotFound,
    Conflict,
    Storage,
}

impl WalkinError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether repeating the same command unchanged may succeed.
    ///
    /// Only concurrency conflicts and infrastructure failures qualify; every
    /// other kind fails identically until the input or queue state changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Storage(_))
    }
}

/// A required input was missing or out of range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgumentError {
    /// A required identifier or text was empty.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// A numeric input had to be strictly positive.
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    /// A structured input broke an internal consistency rule.
    #[error("{field} is malformed: {reason}")]
    Malformed {
        field: &'static str,
        reason: &'static str,
    },
}

impl InvalidArgumentError {
    /// Name of the offending input field.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::NotPositive { field }
            | Self::Malformed { field, .. } => field,
        }
    }
}

/// A command was attempted against a state that forbids it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStateError {
    /// An entry transition that the state machine does not allow.
    #[error("cannot {operation} an entry in status {status}")]
    Transition {
        status: EntryStatus,
        operation: &'static str,
    },

    /// New entries were offered to a deactivated queue.
    #[error("queue is not active")]
    QueueInactive,

    /// Every ticket position has been handed out; positions are never reused.
    #[error("queue has run out of ticket positions")]
    PositionsExhausted,
}

/// A join was attempted on a queue already holding `max_size` active entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("queue is full ({max_size} active entries)")]
pub struct CapacityExceededError {
    pub max_size: u32,
}

/// A referenced item could not be found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The stored aggregate version differs from the one the caller loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("queue {queue_id} was modified concurrently (expected version {expected_version})")]
pub struct ConflictError {
    pub queue_id: String,
    pub expected_version: u64,
}
