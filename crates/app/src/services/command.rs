//! Use-case inputs and the structured result every use case returns.
//!
//! Inputs carry raw strings the way they arrive from an HTTP or kiosk layer.
//! The service only checks their *format* (identifiers parse, actor present);
//! every business rule is left to the aggregate.

use std::str::FromStr;

use walkin_domain::entry::EntryStatus;
use walkin_domain::error::{ErrorKind, WalkinError};
use walkin_domain::id::{ActorId, QueueEntryId, QueueId};
use walkin_domain::queue::Queue;

/// A customer asks to join a queue.
#[derive(Debug, Clone, Default)]
pub struct JoinQueue {
    pub queue_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub staff_member_id: Option<String>,
    pub service_type_id: Option<String>,
    pub notes: Option<String>,
    /// Staff currently serving, used for the wait estimate in the result.
    pub active_staff_count: u32,
    pub actor: String,
}

/// A staff member asks for the next customer.
#[derive(Debug, Clone, Default)]
pub struct CallNext {
    pub queue_id: String,
    pub staff_member_id: String,
    pub actor: String,
}

/// A command addressing one existing entry (check-in, cancel, no-show).
#[derive(Debug, Clone, Default)]
pub struct EntryCommand {
    pub queue_id: String,
    pub entry_id: String,
    pub actor: String,
}

/// Service finished for a checked-in customer.
#[derive(Debug, Clone, Default)]
pub struct FinishService {
    pub queue_id: String,
    pub entry_id: String,
    pub service_duration_minutes: u32,
    pub actor: String,
}

/// A customer (or kiosk) asks where they stand.
#[derive(Debug, Clone, Default)]
pub struct EntryStatusQuery {
    pub queue_id: String,
    pub entry_id: String,
    pub active_staff_count: u32,
    pub actor: String,
}

/// Change capacity and late-client cap.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueueSettings {
    pub queue_id: String,
    pub max_size: u32,
    pub late_client_cap_minutes: u32,
    pub actor: String,
}

/// Open or close a queue to new joins.
#[derive(Debug, Clone, Default)]
pub struct SetQueueActive {
    pub queue_id: String,
    pub active: bool,
    pub actor: String,
}

/// One problem reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The named input is wrong; fix it before retrying.
    Field { field: String, message: String },
    /// The operation cannot be performed right now.
    General {
        kind: ErrorKind,
        message: String,
        retryable: bool,
    },
}

impl CommandError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<&WalkinError> for CommandError {
    fn from(err: &WalkinError) -> Self {
        match err {
            WalkinError::InvalidArgument(invalid) => Self::field(invalid.field(), invalid.to_string()),
            other => Self::General {
                kind: other.kind(),
                message: other.to_string(),
                retryable: other.is_retryable(),
            },
        }
    }
}

/// Outcome of a queue use case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub entry_id: Option<QueueEntryId>,
    /// Stored, never-reused position of the ticket.
    pub ticket_number: Option<u32>,
    /// Current 1-based rank among waiting customers (0 once called or removed).
    pub position: Option<u32>,
    pub estimated_wait_minutes: Option<u32>,
    pub status: Option<EntryStatus>,
    pub errors: Vec<CommandError>,
}

impl CommandResult {
    /// Successful result describing `entry_id` as it stands in `queue`.
    pub(crate) fn for_entry(queue: &Queue, entry_id: QueueEntryId) -> Self {
        let entry = queue.entry(entry_id);
        Self {
            success: true,
            entry_id: Some(entry_id),
            ticket_number: entry.map(|entry| entry.position),
            position: queue.position_of(entry_id).ok(),
            estimated_wait_minutes: None,
            status: entry.map(|entry| entry.status),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn with_estimate(mut self, minutes: Option<u32>) -> Self {
        self.estimated_wait_minutes = minutes;
        self
    }

    /// Successful result that concerns the queue rather than one entry.
    pub(crate) fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub(crate) fn rejected(errors: Vec<CommandError>) -> Self {
        Self {
            success: false,
            errors,
            ..Self::default()
        }
    }

    pub(crate) fn failed(err: &WalkinError) -> Self {
        Self::rejected(vec![CommandError::from(err)])
    }

    /// Field-level errors only, i.e. input the caller must correct.
    pub fn field_errors(&self) -> impl Iterator<Item = &CommandError> {
        self.errors
            .iter()
            .filter(|err| matches!(err, CommandError::Field { .. }))
    }

    /// Whether retrying the same input later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !self.success
            && self.errors.iter().all(|err| {
                matches!(
                    err,
                    CommandError::General {
                        retryable: true,
                        ..
                    }
                )
            })
    }
}

/// Collects format errors across all fields of one input.
#[derive(Default)]
pub(crate) struct InputCheck {
    errors: Vec<CommandError>,
}

impl InputCheck {
    pub(crate) fn id<T: FromStr>(&mut self, field: &str, raw: &str) -> Option<T> {
        match raw.trim().parse() {
            Ok(id) => Some(id),
            Err(_) => {
                self.errors
                    .push(CommandError::field(field, format!("{field} is not a valid identifier")));
                None
            }
        }
    }

    pub(crate) fn actor(&mut self, raw: &str) -> Option<ActorId> {
        let actor = ActorId::new(raw.trim());
        if actor.is_blank() {
            self.errors
                .push(CommandError::field("actor", "actor must not be empty"));
            None
        } else {
            Some(actor)
        }
    }

    pub(crate) fn queue_id(&mut self, raw: &str) -> Option<QueueId> {
        self.id("queue_id", raw)
    }

    pub(crate) fn entry_id(&mut self, raw: &str) -> Option<QueueEntryId> {
        self.id("entry_id", raw)
    }

    /// Failed result carrying every collected error.
    pub(crate) fn rejected(self) -> CommandResult {
        CommandResult::rejected(self.errors)
    }
}
