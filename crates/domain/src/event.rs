//! Event — an immutable record of something that happened to a queue.
//!
//! Aggregate commands return events instead of raising them on a bus; the
//! application layer hands them to the event publisher once the change is
//! persisted.

use serde::{Deserialize, Serialize};

use crate::id::{ActorId, EventId, QueueEntryId, QueueId};
use crate::time::Timestamp;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventType {
    CustomerJoined,
    CustomerCalled,
    CustomerCheckedIn,
    ServiceCompleted,
    EntryCancelled,
    CustomerNoShow,
    SettingsUpdated,
    QueueActivated,
    QueueDeactivated,
}

impl std::fmt::Display for QueueEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CustomerJoined => "customer_joined",
            Self::CustomerCalled => "customer_called",
            Self::CustomerCheckedIn => "customer_checked_in",
            Self::ServiceCompleted => "service_completed",
            Self::EntryCancelled => "entry_cancelled",
            Self::CustomerNoShow => "customer_no_show",
            Self::SettingsUpdated => "settings_updated",
            Self::QueueActivated => "queue_activated",
            Self::QueueDeactivated => "queue_deactivated",
        };
        f.write_str(s)
    }
}

/// A single domain event emitted by a [`Queue`](crate::queue::Queue) command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub id: EventId,
    pub event_type: QueueEventType,
    pub queue_id: QueueId,
    pub entry_id: Option<QueueEntryId>,
    pub actor: ActorId,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl QueueEvent {
    #[must_use]
    pub fn new(
        event_type: QueueEventType,
        queue_id: QueueId,
        entry_id: Option<QueueEntryId>,
        actor: ActorId,
        data: serde_json::Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            queue_id,
            entry_id,
            actor,
            data,
            timestamp,
        }
    }
}
