//! Queue entry — a single customer's ticket and its status state machine.
//!
//! ```text
//! Waiting ──call──▶ Called ──check_in──▶ CheckedIn ──complete──▶ Completed
//!    │                 │
//!    └──cancel──▶ Cancelled    └──mark_no_show──▶ NoShow
//! ```
//!
//! Every transition stamps its own timestamp exactly once. A transition that
//! is not in the diagram fails with [`InvalidStateError::Transition`] and
//! leaves the entry untouched.

mod status;

pub use status::{EntryStatus, UnknownStatus};

use serde::{Deserialize, Serialize};

use crate::error::{InvalidArgumentError, InvalidStateError, WalkinError};
use crate::id::{CustomerId, QueueEntryId, QueueId, ServiceTypeId, StaffMemberId};
use crate::time::Timestamp;

/// One customer's place in a [`Queue`](crate::queue::Queue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub queue_id: QueueId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub position: u32,
    pub status: EntryStatus,
    pub staff_member_id: Option<StaffMemberId>,
    pub service_type_id: Option<ServiceTypeId>,
    pub notes: Option<String>,
    pub entered_at: Timestamp,
    pub called_at: Option<Timestamp>,
    pub checked_in_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub service_duration_minutes: Option<u32>,
}

/// Customer-supplied details for a new ticket.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewEntry {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub staff_member_id: Option<StaffMemberId>,
    pub service_type_id: Option<ServiceTypeId>,
    pub notes: Option<String>,
}

impl NewEntry {
    #[must_use]
    pub fn new(customer_id: impl Into<CustomerId>, customer_name: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            customer_name: customer_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn staff_member_id(mut self, staff_member_id: impl Into<StaffMemberId>) -> Self {
        self.staff_member_id = Some(staff_member_id.into());
        self
    }

    #[must_use]
    pub fn service_type_id(mut self, service_type_id: impl Into<ServiceTypeId>) -> Self {
        self.service_type_id = Some(service_type_id.into());
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl QueueEntry {
    /// Open a fresh `Waiting` ticket at `position`.
    pub(crate) fn waiting(
        queue_id: QueueId,
        position: u32,
        details: NewEntry,
        entered_at: Timestamp,
    ) -> Self {
        Self {
            id: QueueEntryId::new(),
            queue_id,
            customer_id: details.customer_id,
            customer_name: details.customer_name,
            position,
            status: EntryStatus::Waiting,
            staff_member_id: details.staff_member_id,
            service_type_id: details.service_type_id,
            notes: details.notes,
            entered_at,
            called_at: None,
            checked_in_at: None,
            completed_at: None,
            cancelled_at: None,
            service_duration_minutes: None,
        }
    }

    fn expect_status(
        &self,
        expected: EntryStatus,
        operation: &'static str,
    ) -> Result<(), WalkinError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(InvalidStateError::Transition {
                status: self.status,
                operation,
            }
            .into())
        }
    }

    /// `Waiting → Called`, assigning the staff member who will serve.
    ///
    /// # Errors
    ///
    /// [`WalkinError::InvalidState`] unless `Waiting`;
    /// [`WalkinError::InvalidArgument`] when `staff_member_id` is blank.
    pub fn call(
        &mut self,
        staff_member_id: StaffMemberId,
        at: Timestamp,
    ) -> Result<(), WalkinError> {
        self.expect_status(EntryStatus::Waiting, "call")?;
        if staff_member_id.is_blank() {
            return Err(InvalidArgumentError::Empty {
                field: "staff_member_id",
            }
            .into());
        }
        self.status = EntryStatus::Called;
        self.called_at = Some(at);
        self.staff_member_id = Some(staff_member_id);
        Ok(())
    }

    /// `Called → CheckedIn`.
    ///
    /// # Errors
    ///
    /// [`WalkinError::InvalidState`] unless `Called`.
    pub fn check_in(&mut self, at: Timestamp) -> Result<(), WalkinError> {
        self.expect_status(EntryStatus::Called, "check in")?;
        self.status = EntryStatus::CheckedIn;
        self.checked_in_at = Some(at);
        Ok(())
    }

    /// `CheckedIn → Completed`, recording how long the service took.
    ///
    /// # Errors
    ///
    /// [`WalkinError::InvalidState`] unless `CheckedIn`;
    /// [`WalkinError::InvalidArgument`] when `duration_minutes` is zero.
    pub fn complete(&mut self, duration_minutes: u32, at: Timestamp) -> Result<(), WalkinError> {
        self.expect_status(EntryStatus::CheckedIn, "complete")?;
        if duration_minutes == 0 {
            return Err(InvalidArgumentError::NotPositive {
                field: "service_duration_minutes",
            }
            .into());
        }
        self.status = EntryStatus::Completed;
        self.completed_at = Some(at);
        self.service_duration_minutes = Some(duration_minutes);
        Ok(())
    }

    /// `Waiting → Cancelled`.
    ///
    /// # Errors
    ///
    /// [`WalkinError::InvalidState`] unless `Waiting`.
    pub fn cancel(&mut self, at: Timestamp) -> Result<(), WalkinError> {
        self.expect_status(EntryStatus::Waiting, "cancel")?;
        self.status = EntryStatus::Cancelled;
        self.cancelled_at = Some(at);
        Ok(())
    }

    /// `Called → NoShow`.
    ///
    /// # Errors
    ///
    /// [`WalkinError::InvalidState`] unless `Called`.
    pub fn mark_as_no_show(&mut self) -> Result<(), WalkinError> {
        self.expect_status(EntryStatus::Called, "mark as no-show")?;
        self.status = EntryStatus::NoShow;
        Ok(())
    }

    /// Whether the entry counts against capacity.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.status == EntryStatus::Waiting
    }
}
