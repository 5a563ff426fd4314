//! Queue — the aggregate root for one location's line on one day.
//!
//! The queue owns its entries outright: tickets are only created through
//! [`Queue::add_customer`] and only change status through queue commands.
//! Every command either applies completely or leaves the queue unchanged.
//!
//! A `Queue` value is plain, single-owner state. Callers must serialise
//! commands against the same queue; the persistence layer does that with the
//! [`version`](Queue::version) token.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::context::CommandContext;
use crate::entry::{EntryStatus, NewEntry, QueueEntry};
use crate::error::{
    CapacityExceededError, InvalidArgumentError, InvalidStateError, NotFoundError, WalkinError,
};
use crate::event::{QueueEvent, QueueEventType};
use crate::id::{LocationId, QueueEntryId, QueueId, StaffMemberId};
use crate::time::{QueueDate, minutes_between};
use crate::wait_time::{self, WaitEstimate};

/// Default cap on concurrently active entries.
pub const DEFAULT_MAX_SIZE: u32 = 50;

/// Default minutes a called customer may take to check in.
pub const DEFAULT_LATE_CLIENT_CAP_MINUTES: u32 = 10;

/// Tunable limits of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    pub max_size: u32,
    pub late_client_cap_minutes: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            late_client_cap_minutes: DEFAULT_LATE_CLIENT_CAP_MINUTES,
        }
    }
}

impl QueueSettings {
    /// # Errors
    ///
    /// Returns [`WalkinError::InvalidArgument`] when `max_size` is zero.
    pub fn validate(&self) -> Result<(), WalkinError> {
        if self.max_size == 0 {
            return Err(InvalidArgumentError::NotPositive { field: "max_size" }.into());
        }
        Ok(())
    }
}

/// The entry a command touched, as it looks afterwards, plus the event it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub entry: QueueEntry,
    pub event: QueueEvent,
}

/// Per-status counts and the historical service average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u32,
    pub called: u32,
    pub checked_in: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub no_show: u32,
    pub average_service_minutes: Option<u32>,
}

/// One day's ordered line of customers for one location.
///
/// Only [`QueueBuilder`] constructs a queue, so there is no `Deserialize`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Queue {
    id: QueueId,
    location_id: LocationId,
    queue_date: QueueDate,
    is_active: bool,
    settings: QueueSettings,
    entries: Vec<QueueEntry>,
    version: u64,
}

impl Queue {
    /// Create a builder for constructing a [`Queue`].
    #[must_use]
    pub fn builder() -> QueueBuilder {
        QueueBuilder::default()
    }

    #[must_use]
    pub fn id(&self) -> QueueId {
        self.id
    }

    #[must_use]
    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    #[must_use]
    pub fn queue_date(&self) -> QueueDate {
        self.queue_date
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn settings(&self) -> QueueSettings {
        self.settings
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.settings.max_size
    }

    #[must_use]
    pub fn late_client_cap_minutes(&self) -> u32 {
        self.settings.late_client_cap_minutes
    }

    /// All entries in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, entry_id: QueueEntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|entry| entry.id == entry_id)
    }

    /// Optimistic-concurrency token, owned by the repository.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record the version the repository stored this queue under.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Number of entries counting against `max_size` (`Waiting` or `Called`).
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_active()).count()
    }

    /// Waiting entries, lowest position first.
    pub fn waiting(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter().filter(|entry| entry.is_waiting())
    }

    fn next_position(&self) -> Result<u32, WalkinError> {
        match self.entries.iter().map(|entry| entry.position).max() {
            None => Ok(1),
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| InvalidStateError::PositionsExhausted.into()),
        }
    }

    fn entry_index(&self, entry_id: QueueEntryId) -> Result<usize, WalkinError> {
        self.entries
            .iter()
            .position(|entry| entry.id == entry_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "QueueEntry",
                    id: entry_id.to_string(),
                }
                .into()
            })
    }

    fn event(
        &self,
        event_type: QueueEventType,
        entry: Option<&QueueEntry>,
        ctx: &CommandContext,
        data: serde_json::Value,
    ) -> QueueEvent {
        QueueEvent::new(
            event_type,
            self.id,
            entry.map(|entry| entry.id),
            ctx.actor.clone(),
            data,
            ctx.at,
        )
    }

    /// Apply `change` to a copy of the entry and commit only if it succeeds.
    fn transition(
        &mut self,
        index: usize,
        ctx: &CommandContext,
        event_type: QueueEventType,
        change: impl FnOnce(&mut QueueEntry) -> Result<serde_json::Value, WalkinError>,
    ) -> Result<Transition, WalkinError> {
        let mut entry = self.entries[index].clone();
        let data = change(&mut entry)?;
        let event = self.event(event_type, Some(&entry), ctx, data);
        self.entries[index] = entry.clone();
        Ok(Transition { entry, event })
    }

    /// Append a new `Waiting` ticket at the next position.
    ///
    /// # Errors
    ///
    /// - [`WalkinError::InvalidArgument`] when `customer_id` is blank
    /// - [`WalkinError::InvalidState`] when the queue is inactive or has
    ///   issued every position
    /// - [`WalkinError::CapacityExceeded`] when `max_size` entries are active
    pub fn add_customer(
        &mut self,
        details: NewEntry,
        ctx: &CommandContext,
    ) -> Result<Transition, WalkinError> {
        if details.customer_id.is_blank() {
            return Err(InvalidArgumentError::Empty {
                field: "customer_id",
            }
            .into());
        }
        if !self.is_active {
            return Err(InvalidStateError::QueueInactive.into());
        }
        let max_size = usize::try_from(self.settings.max_size).unwrap_or(usize::MAX);
        if self.active_count() >= max_size {
            return Err(CapacityExceededError {
                max_size: self.settings.max_size,
            }
            .into());
        }

        let position = self.next_position()?;
        let entry = QueueEntry::waiting(self.id, position, details, ctx.at);
        let event = self.event(
            QueueEventType::CustomerJoined,
            Some(&entry),
            ctx,
            serde_json::json!({
                "customer_id": entry.customer_id,
                "customer_name": entry.customer_name,
                "position": entry.position,
            }),
        );
        self.entries.push(entry.clone());
        Ok(Transition { entry, event })
    }

    /// Call the waiting customer with the lowest position.
    ///
    /// # Errors
    ///
    /// - [`WalkinError::InvalidArgument`] when `staff_member_id` is blank
    /// - [`WalkinError::NotFound`] when nobody is waiting
    pub fn call_next(
        &mut self,
        staff_member_id: StaffMemberId,
        ctx: &CommandContext,
    ) -> Result<Transition, WalkinError> {
        if staff_member_id.is_blank() {
            return Err(InvalidArgumentError::Empty {
                field: "staff_member_id",
            }
            .into());
        }
        let next = self
            .waiting()
            .min_by_key(|entry| entry.position)
            .map(|entry| entry.id)
            .ok_or_else(|| NotFoundError {
                entity: "waiting entry in queue",
                id: self.id.to_string(),
            })?;
        let index = self.entry_index(next)?;

        self.transition(index, ctx, QueueEventType::CustomerCalled, |entry| {
            entry.call(staff_member_id, ctx.at)?;
            Ok(serde_json::json!({
                "customer_id": entry.customer_id,
                "position": entry.position,
                "staff_member_id": entry.staff_member_id,
            }))
        })
    }

    /// Check in a called customer.
    ///
    /// # Errors
    ///
    /// [`WalkinError::NotFound`] for an unknown entry, or
    /// [`WalkinError::InvalidState`] unless it is `Called`.
    pub fn check_in(
        &mut self,
        entry_id: QueueEntryId,
        ctx: &CommandContext,
    ) -> Result<Transition, WalkinError> {
        let index = self.entry_index(entry_id)?;
        self.transition(index, ctx, QueueEventType::CustomerCheckedIn, |entry| {
            entry.check_in(ctx.at)?;
            Ok(serde_json::json!({
                "waited_minutes": minutes_between(entry.entered_at, ctx.at),
            }))
        })
    }

    /// Finish service for a checked-in customer.
    ///
    /// # Errors
    ///
    /// [`WalkinError::NotFound`] for an unknown entry,
    /// [`WalkinError::InvalidState`] unless it is `CheckedIn`, or
    /// [`WalkinError::InvalidArgument`] for a zero duration.
    pub fn complete(
        &mut self,
        entry_id: QueueEntryId,
        service_duration_minutes: u32,
        ctx: &CommandContext,
    ) -> Result<Transition, WalkinError> {
        let index = self.entry_index(entry_id)?;
        self.transition(index, ctx, QueueEventType::ServiceCompleted, |entry| {
            entry.complete(service_duration_minutes, ctx.at)?;
            Ok(serde_json::json!({
                "service_duration_minutes": service_duration_minutes,
                "staff_member_id": entry.staff_member_id,
            }))
        })
    }

    /// Withdraw a waiting customer.
    ///
    /// # Errors
    ///
    /// [`WalkinError::NotFound`] for an unknown entry, or
    /// [`WalkinError::InvalidState`] unless it is `Waiting`.
    pub fn cancel(
        &mut self,
        entry_id: QueueEntryId,
        ctx: &CommandContext,
    ) -> Result<Transition, WalkinError> {
        let index = self.entry_index(entry_id)?;
        self.transition(index, ctx, QueueEventType::EntryCancelled, |entry| {
            entry.cancel(ctx.at)?;
            Ok(serde_json::json!({ "position": entry.position }))
        })
    }

    /// Mark a called customer as absent without waiting for the late cap.
    ///
    /// # Errors
    ///
    /// [`WalkinError::NotFound`] for an unknown entry, or
    /// [`WalkinError::InvalidState`] unless it is `Called`.
    pub fn mark_no_show(
        &mut self,
        entry_id: QueueEntryId,
        ctx: &CommandContext,
    ) -> Result<Transition, WalkinError> {
        let index = self.entry_index(entry_id)?;
        self.transition(index, ctx, QueueEventType::CustomerNoShow, |entry| {
            entry.mark_as_no_show()?;
            Ok(serde_json::json!({ "reason": "marked" }))
        })
    }

    /// Evict every called customer whose call is older than the late cap.
    ///
    /// `ctx.at` is the "now" the cap is measured against; an entry called at
    /// `T` is evicted when `ctx.at - T` is strictly greater than the cap.
    /// `Waiting` entries never expire.
    pub fn remove_late_customers(&mut self, ctx: &CommandContext) -> Vec<QueueEvent> {
        let cap = Duration::minutes(i64::from(self.settings.late_client_cap_minutes));
        let late: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.status == EntryStatus::Called)
            .filter(|(_, entry)| entry.called_at.is_some_and(|called| ctx.at - called > cap))
            .map(|(index, _)| index)
            .collect();

        let mut events = Vec::with_capacity(late.len());
        for index in late {
            let called_at = self.entries[index].called_at;
            let outcome = self.transition(index, ctx, QueueEventType::CustomerNoShow, |entry| {
                entry.mark_as_no_show()?;
                Ok(serde_json::json!({
                    "reason": "late",
                    "called_at": called_at,
                }))
            });
            if let Ok(transition) = outcome {
                events.push(transition.event);
            }
        }
        events
    }

    /// Change capacity and late-client cap.
    ///
    /// Lowering `max_size` below the current active count is allowed; it only
    /// blocks further joins until the line drains.
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::InvalidArgument`] when `max_size` is zero.
    pub fn update_settings(
        &mut self,
        settings: QueueSettings,
        ctx: &CommandContext,
    ) -> Result<QueueEvent, WalkinError> {
        settings.validate()?;
        let previous = self.settings;
        self.settings = settings;
        Ok(self.event(
            QueueEventType::SettingsUpdated,
            None,
            ctx,
            serde_json::json!({ "previous": previous, "current": settings }),
        ))
    }

    /// Accept new entries again. Returns `None` when already active.
    pub fn activate(&mut self, ctx: &CommandContext) -> Option<QueueEvent> {
        if self.is_active {
            return None;
        }
        self.is_active = true;
        Some(self.event(QueueEventType::QueueActivated, None, ctx, serde_json::json!({})))
    }

    /// Stop accepting new entries; existing entries are untouched.
    /// Returns `None` when already inactive.
    pub fn deactivate(&mut self, ctx: &CommandContext) -> Option<QueueEvent> {
        if !self.is_active {
            return None;
        }
        self.is_active = false;
        Some(self.event(
            QueueEventType::QueueDeactivated,
            None,
            ctx,
            serde_json::json!({ "active_entries": self.active_count() }),
        ))
    }

    /// 1-based rank among waiting entries; 0 when the entry is not `Waiting`.
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::NotFound`] for an unknown entry.
    pub fn position_of(&self, entry_id: QueueEntryId) -> Result<u32, WalkinError> {
        wait_time::rank(&self.entries, entry_id).ok_or_else(|| self.missing(entry_id))
    }

    /// Estimated minutes until `entry_id` is called; 0 when not `Waiting`.
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::NotFound`] for an unknown entry.
    pub fn estimated_wait_minutes(
        &self,
        entry_id: QueueEntryId,
        avg_service_minutes: u32,
        active_staff_count: u32,
    ) -> Result<u32, WalkinError> {
        self.wait_estimate(entry_id, avg_service_minutes, active_staff_count)
            .map(|estimate| estimate.minutes)
    }

    /// Rank, customers ahead, and estimated minutes in one read.
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::NotFound`] for an unknown entry.
    pub fn wait_estimate(
        &self,
        entry_id: QueueEntryId,
        avg_service_minutes: u32,
        active_staff_count: u32,
    ) -> Result<WaitEstimate, WalkinError> {
        wait_time::estimate(
            &self.entries,
            entry_id,
            avg_service_minutes,
            active_staff_count,
        )
        .ok_or_else(|| self.missing(entry_id))
    }

    fn missing(&self, entry_id: QueueEntryId) -> WalkinError {
        NotFoundError {
            entity: "QueueEntry",
            id: entry_id.to_string(),
        }
        .into()
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            average_service_minutes: wait_time::average_service_minutes(&self.entries),
            ..QueueStats::default()
        };
        for entry in &self.entries {
            let counter = match entry.status {
                EntryStatus::Waiting => &mut stats.waiting,
                EntryStatus::Called => &mut stats.called,
                EntryStatus::CheckedIn => &mut stats.checked_in,
                EntryStatus::Completed => &mut stats.completed,
                EntryStatus::Cancelled => &mut stats.cancelled,
                EntryStatus::NoShow => &mut stats.no_show,
            };
            *counter += 1;
        }
        stats
    }
}

/// Step-by-step builder for [`Queue`].
///
/// Used both to open a fresh queue and by repositories to rehydrate a stored
/// one; `build` re-checks the position invariant over supplied entries.
#[derive(Debug, Default)]
pub struct QueueBuilder {
    id: Option<QueueId>,
    location_id: Option<LocationId>,
    queue_date: Option<QueueDate>,
    is_active: Option<bool>,
    settings: QueueSettings,
    entries: Vec<QueueEntry>,
    version: u64,
}

impl QueueBuilder {
    #[must_use]
    pub fn id(mut self, id: QueueId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn location_id(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    #[must_use]
    pub fn queue_date(mut self, queue_date: QueueDate) -> Self {
        self.queue_date = Some(queue_date);
        self
    }

    #[must_use]
    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.settings.max_size = max_size;
        self
    }

    #[must_use]
    pub fn late_client_cap_minutes(mut self, minutes: u32) -> Self {
        self.settings.late_client_cap_minutes = minutes;
        self
    }

    #[must_use]
    pub fn entries(mut self, entries: Vec<QueueEntry>) -> Self {
        self.entries = entries;
        self
    }

    #[must_use]
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Consume the builder, validate, and return a [`Queue`].
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::InvalidArgument`] when the location or date is
    /// missing, `max_size` is zero, or the entries do not belong to this
    /// queue in strictly increasing position order.
    pub fn build(self) -> Result<Queue, WalkinError> {
        let location_id = self.location_id.ok_or(InvalidArgumentError::Empty {
            field: "location_id",
        })?;
        let queue_date = self.queue_date.ok_or(InvalidArgumentError::Empty {
            field: "queue_date",
        })?;
        self.settings.validate()?;

        let id = self.id.unwrap_or_default();
        if self.entries.iter().any(|entry| entry.queue_id != id) {
            return Err(InvalidArgumentError::Malformed {
                field: "entries",
                reason: "entry belongs to another queue",
            }
            .into());
        }
        if self
            .entries
            .windows(2)
            .any(|pair| pair[0].position >= pair[1].position)
        {
            return Err(InvalidArgumentError::Malformed {
                field: "entries",
                reason: "positions must be strictly increasing",
            }
            .into());
        }

        Ok(Queue {
            id,
            location_id,
            queue_date,
            is_active: self.is_active.unwrap_or(true),
            settings: self.settings,
            entries: self.entries,
            version: self.version,
        })
    }
}
