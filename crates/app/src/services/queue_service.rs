//! Queue service — the walk-in use cases.
//!
//! Every mutating use case runs the same cycle: check input format, load the
//! queue, apply exactly one aggregate command, save with the version loaded,
//! then publish the resulting events. A version conflict restarts the cycle
//! from a fresh load, so two staff calling "next" at once get different
//! customers and two joins can never both squeeze past `max_size`.

use walkin_domain::context::CommandContext;
use walkin_domain::entry::NewEntry;
use walkin_domain::error::{InvalidStateError, NotFoundError, WalkinError};
use walkin_domain::event::QueueEvent;
use walkin_domain::id::{ActorId, LocationId, QueueEntryId, QueueId, ServiceTypeId, StaffMemberId};
use walkin_domain::queue::{Queue, QueueSettings, Transition};
use walkin_domain::time::QueueDate;

use crate::ports::{Clock, EventPublisher, QueueRepository};
use crate::services::command::{
    CallNext, CommandResult, EntryCommand, EntryStatusQuery, FinishService, InputCheck, JoinQueue,
    SetQueueActive, UpdateQueueSettings,
};

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Tunables for [`QueueService`].
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    /// Extra load-mutate-save rounds after a version conflict.
    pub conflict_retries: u32,
    /// Settings for queues opened without explicit ones.
    pub default_settings: QueueSettings,
    /// Service time assumed until the queue has completed entries.
    pub default_service_minutes: u32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            conflict_retries: 3,
            default_settings: QueueSettings::default(),
            default_service_minutes: 20,
        }
    }
}

/// Outcome of one late-customer sweep over a day's queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub queues_checked: usize,
    pub customers_evicted: usize,
    pub failures: usize,
}

/// Application service orchestrating the queue aggregate.
pub struct QueueService<R, P, C> {
    repo: R,
    publisher: P,
    clock: C,
    options: ServiceOptions,
}

impl<R, P, C> QueueService<R, P, C>
where
    R: QueueRepository,
    P: EventPublisher,
    C: Clock,
{
    /// Create a new service with default options.
    pub fn new(repo: R, publisher: P, clock: C) -> Self {
        Self::with_options(repo, publisher, clock, ServiceOptions::default())
    }

    pub fn with_options(repo: R, publisher: P, clock: C, options: ServiceOptions) -> Self {
        Self {
            repo,
            publisher,
            clock,
            options,
        }
    }

    fn context(&self, actor: &ActorId) -> CommandContext {
        CommandContext::new(actor.clone(), self.clock.now())
    }

    async fn load(&self, queue_id: QueueId) -> Result<Queue, WalkinError> {
        self.repo.get_by_id(queue_id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Queue",
                id: queue_id.to_string(),
            }
            .into()
        })
    }

    async fn publish(&self, events: Vec<QueueEvent>) {
        for event in events {
            let event_type = event.event_type;
            if let Err(err) = self.publisher.publish(event).await {
                tracing::warn!(%err, %event_type, "failed to publish queue event");
            }
        }
    }

    /// Load, apply `command`, save, publish; retried on version conflicts.
    ///
    /// A command that emits no events changed nothing, so nothing is saved.
    async fn mutate<T>(
        &self,
        queue_id: QueueId,
        actor: &ActorId,
        mut command: impl FnMut(
            &mut Queue,
            &CommandContext,
        ) -> Result<(T, Vec<QueueEvent>), WalkinError>,
    ) -> Result<(Queue, T), WalkinError> {
        let mut retries = 0;
        loop {
            let mut queue = self.load(queue_id).await?;
            let ctx = self.context(actor);
            let (value, events) = command(&mut queue, &ctx)?;
            if events.is_empty() {
                return Ok((queue, value));
            }
            match self.repo.save(queue).await {
                Ok(saved) => {
                    self.publish(events).await;
                    return Ok((saved, value));
                }
                Err(WalkinError::Conflict(err)) if retries < self.options.conflict_retries => {
                    retries += 1;
                    tracing::debug!(%err, retries, "queue changed underneath, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn average_service_minutes(&self, queue: &Queue) -> u32 {
        queue
            .stats()
            .average_service_minutes
            .unwrap_or(self.options.default_service_minutes)
    }

    fn report(operation: &'static str, result: Result<CommandResult, WalkinError>) -> CommandResult {
        match result {
            Ok(result) => result,
            Err(err) => {
                if matches!(err, WalkinError::Storage(_)) {
                    tracing::error!(error = %err, operation, "queue command failed");
                } else {
                    tracing::info!(error = %err, operation, "queue command rejected");
                }
                CommandResult::failed(&err)
            }
        }
    }

    /// Return today's queue for `location_id`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::InvalidArgument`] for invalid settings,
    /// [`WalkinError::InvalidState`] when the day's queue exists but was
    /// deactivated, or a storage error propagated from the repository.
    #[tracing::instrument(skip(self, settings))]
    pub async fn open_queue(
        &self,
        location_id: LocationId,
        queue_date: QueueDate,
        settings: Option<QueueSettings>,
    ) -> Result<Queue, WalkinError> {
        if let Some(existing) = self
            .repo
            .get_active_by_location(location_id, queue_date)
            .await?
        {
            return Ok(existing);
        }
        let queue = Queue::builder()
            .location_id(location_id)
            .queue_date(queue_date)
            .settings(settings.unwrap_or(self.options.default_settings))
            .build()?;
        match self.repo.create(queue).await {
            Ok(created) => {
                tracing::info!(queue_id = %created.id(), "opened queue");
                Ok(created)
            }
            // either another opener won the race, or the day's queue was closed
            Err(WalkinError::Conflict(_)) => self
                .repo
                .get_active_by_location(location_id, queue_date)
                .await?
                .ok_or_else(|| InvalidStateError::QueueInactive.into()),
            Err(err) => Err(err),
        }
    }

    /// Look up a queue by id.
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::NotFound`] when no queue with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_queue(&self, id: QueueId) -> Result<Queue, WalkinError> {
        self.load(id).await
    }

    /// Add a customer to the end of the line.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id))]
    pub async fn join_queue(&self, input: JoinQueue) -> CommandResult {
        let mut check = InputCheck::default();
        let queue_id = check.queue_id(&input.queue_id);
        let actor = check.actor(&input.actor);
        let (Some(queue_id), Some(actor)) = (queue_id, actor) else {
            return check.rejected();
        };

        let details = NewEntry {
            customer_id: input.customer_id.trim().into(),
            customer_name: input.customer_name.trim().to_string(),
            staff_member_id: non_blank(input.staff_member_id).map(StaffMemberId::from),
            service_type_id: non_blank(input.service_type_id).map(ServiceTypeId::from),
            notes: non_blank(input.notes),
        };
        let staff = input.active_staff_count;
        let result = self
            .mutate(queue_id, &actor, |queue, ctx| {
                let transition = queue.add_customer(details.clone(), ctx)?;
                Ok((transition.entry.id, vec![transition.event]))
            })
            .await
            .map(|(queue, entry_id)| {
                tracing::info!(%entry_id, "customer joined");
                let minutes = queue
                    .estimated_wait_minutes(entry_id, self.average_service_minutes(&queue), staff)
                    .ok();
                CommandResult::for_entry(&queue, entry_id).with_estimate(minutes)
            });
        Self::report("join_queue", result)
    }

    /// Call the longest-waiting customer for `staff_member_id`.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id))]
    pub async fn call_next(&self, input: CallNext) -> CommandResult {
        let mut check = InputCheck::default();
        let queue_id = check.queue_id(&input.queue_id);
        let actor = check.actor(&input.actor);
        let (Some(queue_id), Some(actor)) = (queue_id, actor) else {
            return check.rejected();
        };

        let staff = StaffMemberId::new(input.staff_member_id.trim());
        let result = self
            .mutate(queue_id, &actor, |queue, ctx| {
                let transition = queue.call_next(staff.clone(), ctx)?;
                Ok((transition.entry.id, vec![transition.event]))
            })
            .await
            .map(|(queue, entry_id)| {
                tracing::info!(%entry_id, staff_member_id = %staff, "customer called");
                CommandResult::for_entry(&queue, entry_id)
            });
        Self::report("call_next", result)
    }

    /// Check in a called customer.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id, entry_id = %input.entry_id))]
    pub async fn check_in(&self, input: EntryCommand) -> CommandResult {
        self.entry_command("check_in", input, |queue, entry_id, ctx| {
            queue.check_in(entry_id, ctx)
        })
        .await
    }

    /// Record a finished service.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id, entry_id = %input.entry_id))]
    pub async fn finish(&self, input: FinishService) -> CommandResult {
        let minutes = input.service_duration_minutes;
        let command = EntryCommand {
            queue_id: input.queue_id,
            entry_id: input.entry_id,
            actor: input.actor,
        };
        self.entry_command("finish", command, |queue, entry_id, ctx| {
            queue.complete(entry_id, minutes, ctx)
        })
        .await
    }

    /// Withdraw a waiting customer.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id, entry_id = %input.entry_id))]
    pub async fn cancel(&self, input: EntryCommand) -> CommandResult {
        self.entry_command("cancel", input, |queue, entry_id, ctx| {
            queue.cancel(entry_id, ctx)
        })
        .await
    }

    /// Mark a called customer as absent.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id, entry_id = %input.entry_id))]
    pub async fn mark_no_show(&self, input: EntryCommand) -> CommandResult {
        self.entry_command("mark_no_show", input, |queue, entry_id, ctx| {
            queue.mark_no_show(entry_id, ctx)
        })
        .await
    }

    async fn entry_command(
        &self,
        operation: &'static str,
        input: EntryCommand,
        command: impl Fn(
            &mut Queue,
            QueueEntryId,
            &CommandContext,
        ) -> Result<Transition, WalkinError>,
    ) -> CommandResult {
        let mut check = InputCheck::default();
        let queue_id = check.queue_id(&input.queue_id);
        let entry_id = check.entry_id(&input.entry_id);
        let actor = check.actor(&input.actor);
        let (Some(queue_id), Some(entry_id), Some(actor)) = (queue_id, entry_id, actor) else {
            return check.rejected();
        };

        let result = self
            .mutate(queue_id, &actor, |queue, ctx| {
                let transition = command(queue, entry_id, ctx)?;
                Ok(((), vec![transition.event]))
            })
            .await
            .map(|(queue, ())| {
                tracing::info!(%entry_id, operation, "entry updated");
                CommandResult::for_entry(&queue, entry_id)
            });
        Self::report(operation, result)
    }

    /// Where a customer stands, evicting late customers first.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id, entry_id = %input.entry_id))]
    pub async fn entry_status(&self, input: EntryStatusQuery) -> CommandResult {
        let mut check = InputCheck::default();
        let queue_id = check.queue_id(&input.queue_id);
        let entry_id = check.entry_id(&input.entry_id);
        let actor = check.actor(&input.actor);
        let (Some(queue_id), Some(entry_id), Some(actor)) = (queue_id, entry_id, actor) else {
            return check.rejected();
        };

        let staff = input.active_staff_count;
        let result = self
            .mutate(queue_id, &actor, |queue, ctx| {
                Ok(((), queue.remove_late_customers(ctx)))
            })
            .await
            .and_then(|(queue, ())| {
                let minutes =
                    queue.estimated_wait_minutes(entry_id, self.average_service_minutes(&queue), staff)?;
                Ok(CommandResult::for_entry(&queue, entry_id).with_estimate(Some(minutes)))
            });
        Self::report("entry_status", result)
    }

    /// Change capacity and late-client cap.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id))]
    pub async fn update_settings(&self, input: UpdateQueueSettings) -> CommandResult {
        let mut check = InputCheck::default();
        let queue_id = check.queue_id(&input.queue_id);
        let actor = check.actor(&input.actor);
        let (Some(queue_id), Some(actor)) = (queue_id, actor) else {
            return check.rejected();
        };

        let settings = QueueSettings {
            max_size: input.max_size,
            late_client_cap_minutes: input.late_client_cap_minutes,
        };
        let result = self
            .mutate(queue_id, &actor, |queue, ctx| {
                let event = queue.update_settings(settings, ctx)?;
                Ok(((), vec![event]))
            })
            .await
            .map(|_| CommandResult::succeeded());
        Self::report("update_settings", result)
    }

    /// Open or close the queue to new joins. Idempotent.
    #[tracing::instrument(skip(self, input), fields(queue_id = %input.queue_id, active = input.active))]
    pub async fn set_active(&self, input: SetQueueActive) -> CommandResult {
        let mut check = InputCheck::default();
        let queue_id = check.queue_id(&input.queue_id);
        let actor = check.actor(&input.actor);
        let (Some(queue_id), Some(actor)) = (queue_id, actor) else {
            return check.rejected();
        };

        let active = input.active;
        let result = self
            .mutate(queue_id, &actor, |queue, ctx| {
                let event = if active {
                    queue.activate(ctx)
                } else {
                    queue.deactivate(ctx)
                };
                Ok(((), event.into_iter().collect()))
            })
            .await
            .map(|_| CommandResult::succeeded());
        Self::report("set_active", result)
    }

    /// Evict late customers from one queue; returns how many were evicted.
    ///
    /// # Errors
    ///
    /// Returns [`WalkinError::NotFound`] for an unknown queue, or a
    /// storage/conflict error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn remove_late_customers(
        &self,
        queue_id: QueueId,
        actor: &ActorId,
    ) -> Result<usize, WalkinError> {
        let (_, evicted) = self
            .mutate(queue_id, actor, |queue, ctx| {
                let events = queue.remove_late_customers(ctx);
                Ok((events.len(), events))
            })
            .await?;
        if evicted > 0 {
            tracing::info!(evicted, "late customers marked as no-show");
        }
        Ok(evicted)
    }

    /// Run [`remove_late_customers`](Self::remove_late_customers) over every
    /// queue of `date`. A failing queue is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the day's queues cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_late_customers(
        &self,
        date: QueueDate,
        actor: &ActorId,
    ) -> Result<SweepReport, WalkinError> {
        let queues = self.repo.list_for_date(date).await?;
        let mut report = SweepReport::default();
        for queue in queues {
            report.queues_checked += 1;
            match self.remove_late_customers(queue.id(), actor).await {
                Ok(evicted) => report.customers_evicted += evicted,
                Err(err) => {
                    tracing::warn!(%err, queue_id = %queue.id(), "late-customer sweep failed");
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use walkin_domain::entry::EntryStatus;
    use walkin_domain::error::ErrorKind;
    use walkin_domain::event::QueueEventType;

    use crate::in_memory::InMemoryQueueRepository;
    use crate::ports::ManualClock;
    use crate::services::command::CommandError;

    #[derive(Default, Clone)]
    struct RecordingPublisher {
        events: Arc<Mutex<Vec<QueueEvent>>>,
    }

    impl RecordingPublisher {
        fn types(&self) -> Vec<QueueEventType> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type)
                .collect()
        }
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(
            &self,
            event: QueueEvent,
        ) -> impl std::future::Future<Output = Result<(), WalkinError>> + Send {
            self.events.lock().unwrap().push(event);
            async { Ok(()) }
        }
    }

    /// Repository whose first `conflicts` saves fail as if another writer won.
    struct FlakyRepo {
        inner: InMemoryQueueRepository,
        conflicts: Mutex<u32>,
    }

    impl QueueRepository for FlakyRepo {
        fn create(
            &self,
            queue: Queue,
        ) -> impl std::future::Future<Output = Result<Queue, WalkinError>> + Send {
            self.inner.create(queue)
        }

        fn get_by_id(
            &self,
            id: QueueId,
        ) -> impl std::future::Future<Output = Result<Option<Queue>, WalkinError>> + Send {
            self.inner.get_by_id(id)
        }

        fn get_active_by_location(
            &self,
            location_id: LocationId,
            date: QueueDate,
        ) -> impl std::future::Future<Output = Result<Option<Queue>, WalkinError>> + Send {
            self.inner.get_active_by_location(location_id, date)
        }

        fn list_for_date(
            &self,
            date: QueueDate,
        ) -> impl std::future::Future<Output = Result<Vec<Queue>, WalkinError>> + Send {
            self.inner.list_for_date(date)
        }

        fn save(
            &self,
            queue: Queue,
        ) -> impl std::future::Future<Output = Result<Queue, WalkinError>> + Send {
            let mut remaining = self.conflicts.lock().unwrap();
            let conflict = *remaining > 0;
            if conflict {
                *remaining -= 1;
            }
            drop(remaining);
            let queue_id = queue.id().to_string();
            let expected_version = queue.version();
            let save = (!conflict).then(|| self.inner.save(queue));
            async move {
                match save {
                    Some(save) => save.await,
                    None => Err(walkin_domain::error::ConflictError {
                        queue_id,
                        expected_version,
                    }
                    .into()),
                }
            }
        }
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 9, 0, 0).unwrap()
    }

    fn day() -> QueueDate {
        NaiveDate::from_ymd_opt(2024, 5, 4).unwrap()
    }

    type TestService = QueueService<Arc<InMemoryQueueRepository>, RecordingPublisher, Arc<ManualClock>>;

    struct Harness {
        service: TestService,
        publisher: RecordingPublisher,
        clock: Arc<ManualClock>,
        queue_id: String,
    }

    async fn harness(max_size: u32) -> Harness {
        let publisher = RecordingPublisher::default();
        let clock = Arc::new(ManualClock::new(t0()));
        let service = QueueService::new(
            Arc::new(InMemoryQueueRepository::default()),
            publisher.clone(),
            Arc::clone(&clock),
        );
        let queue = service
            .open_queue(
                LocationId::new(),
                day(),
                Some(QueueSettings {
                    max_size,
                    late_client_cap_minutes: 10,
                }),
            )
            .await
            .unwrap();
        Harness {
            service,
            publisher,
            clock,
            queue_id: queue.id().to_string(),
        }
    }

    fn join(queue_id: &str, customer: &str) -> JoinQueue {
        JoinQueue {
            queue_id: queue_id.to_string(),
            customer_id: customer.to_string(),
            customer_name: customer.to_uppercase(),
            active_staff_count: 1,
            actor: "kiosk".to_string(),
            ..JoinQueue::default()
        }
    }

    fn call(queue_id: &str) -> CallNext {
        CallNext {
            queue_id: queue_id.to_string(),
            staff_member_id: "staff-x".to_string(),
            actor: "staff-x".to_string(),
        }
    }

    fn entry_cmd(queue_id: &str, entry_id: QueueEntryId) -> EntryCommand {
        EntryCommand {
            queue_id: queue_id.to_string(),
            entry_id: entry_id.to_string(),
            actor: "staff-x".to_string(),
        }
    }

    #[tokio::test]
    async fn should_join_and_report_position_and_estimate() {
        let h = harness(5).await;

        let first = h.service.join_queue(join(&h.queue_id, "alice")).await;
        let second = h.service.join_queue(join(&h.queue_id, "bob")).await;

        assert!(first.success, "{:?}", first.errors);
        assert_eq!(first.ticket_number, Some(1));
        assert_eq!(first.position, Some(1));
        assert_eq!(first.estimated_wait_minutes, Some(0));
        assert_eq!(first.status, Some(EntryStatus::Waiting));

        assert_eq!(second.ticket_number, Some(2));
        assert_eq!(second.position, Some(2));
        assert_eq!(second.estimated_wait_minutes, Some(20));
        assert_eq!(
            h.publisher.types(),
            vec![QueueEventType::CustomerJoined, QueueEventType::CustomerJoined]
        );
    }

    #[tokio::test]
    async fn should_report_field_errors_for_malformed_input() {
        let h = harness(5).await;
        let mut input = join("not-a-uuid", "alice");
        input.actor = String::new();

        let result = h.service.join_queue(input).await;

        assert!(!result.success);
        assert_eq!(result.field_errors().count(), 2);
        assert!(h.publisher.types().is_empty());
    }

    #[tokio::test]
    async fn should_surface_blank_customer_as_field_error() {
        let h = harness(5).await;
        let result = h.service.join_queue(join(&h.queue_id, " ")).await;

        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec![CommandError::field(
                "customer_id",
                "customer_id must not be empty"
            )]
        );
    }

    #[tokio::test]
    async fn should_report_capacity_as_general_error() {
        let h = harness(1).await;
        assert!(h.service.join_queue(join(&h.queue_id, "a")).await.success);

        let result = h.service.join_queue(join(&h.queue_id, "b")).await;

        assert!(!result.success);
        assert!(!result.is_retryable());
        assert!(matches!(
            result.errors[0],
            CommandError::General {
                kind: ErrorKind::CapacityExceeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_report_not_found_for_unknown_queue() {
        let h = harness(1).await;
        let result = h
            .service
            .join_queue(join(&QueueId::new().to_string(), "a"))
            .await;
        assert!(matches!(
            result.errors[0],
            CommandError::General {
                kind: ErrorKind::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_serve_customer_end_to_end() {
        let h = harness(5).await;
        let joined = h.service.join_queue(join(&h.queue_id, "alice")).await;
        let entry_id = joined.entry_id.unwrap();

        let called = h.service.call_next(call(&h.queue_id)).await;
        assert_eq!(called.entry_id, Some(entry_id));
        assert_eq!(called.status, Some(EntryStatus::Called));
        assert_eq!(called.position, Some(0));

        let checked = h.service.check_in(entry_cmd(&h.queue_id, entry_id)).await;
        assert_eq!(checked.status, Some(EntryStatus::CheckedIn));

        let finished = h
            .service
            .finish(FinishService {
                queue_id: h.queue_id.clone(),
                entry_id: entry_id.to_string(),
                service_duration_minutes: 25,
                actor: "staff-x".to_string(),
            })
            .await;
        assert_eq!(finished.status, Some(EntryStatus::Completed));

        let queue = h.service.get_queue(h.queue_id.parse().unwrap()).await.unwrap();
        assert_eq!(queue.stats().average_service_minutes, Some(25));
        assert_eq!(queue.version(), 4);
        assert_eq!(
            h.publisher.types(),
            vec![
                QueueEventType::CustomerJoined,
                QueueEventType::CustomerCalled,
                QueueEventType::CustomerCheckedIn,
                QueueEventType::ServiceCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn should_reject_illegal_transition_without_saving() {
        let h = harness(5).await;
        let joined = h.service.join_queue(join(&h.queue_id, "alice")).await;
        let entry_id = joined.entry_id.unwrap();

        let result = h.service.check_in(entry_cmd(&h.queue_id, entry_id)).await;

        assert!(matches!(
            result.errors[0],
            CommandError::General {
                kind: ErrorKind::InvalidState,
                retryable: false,
                ..
            }
        ));
        let queue = h.service.get_queue(h.queue_id.parse().unwrap()).await.unwrap();
        assert_eq!(queue.version(), 1);
        assert_eq!(queue.entry(entry_id).unwrap().status, EntryStatus::Waiting);
    }

    #[tokio::test]
    async fn should_report_empty_queue_when_calling_next() {
        let h = harness(5).await;
        let result = h.service.call_next(call(&h.queue_id)).await;
        assert!(matches!(
            result.errors[0],
            CommandError::General {
                kind: ErrorKind::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_cancel_waiting_customer() {
        let h = harness(5).await;
        let a = h.service.join_queue(join(&h.queue_id, "a")).await;
        let b = h.service.join_queue(join(&h.queue_id, "b")).await;

        let cancelled = h
            .service
            .cancel(entry_cmd(&h.queue_id, a.entry_id.unwrap()))
            .await;
        assert_eq!(cancelled.status, Some(EntryStatus::Cancelled));

        let status = h
            .service
            .entry_status(EntryStatusQuery {
                queue_id: h.queue_id.clone(),
                entry_id: b.entry_id.unwrap().to_string(),
                active_staff_count: 1,
                actor: "kiosk".to_string(),
            })
            .await;
        assert_eq!(status.position, Some(1));
        assert_eq!(status.estimated_wait_minutes, Some(0));
    }

    #[tokio::test]
    async fn should_evict_late_customer_lazily_on_status_read() {
        let h = harness(5).await;
        let joined = h.service.join_queue(join(&h.queue_id, "alice")).await;
        let entry_id = joined.entry_id.unwrap();
        h.service.call_next(call(&h.queue_id)).await;

        h.clock.advance(Duration::minutes(11));
        let status = h
            .service
            .entry_status(EntryStatusQuery {
                queue_id: h.queue_id.clone(),
                entry_id: entry_id.to_string(),
                active_staff_count: 1,
                actor: "kiosk".to_string(),
            })
            .await;

        assert_eq!(status.status, Some(EntryStatus::NoShow));
        assert_eq!(status.position, Some(0));
        assert!(h.publisher.types().contains(&QueueEventType::CustomerNoShow));
    }

    #[tokio::test]
    async fn should_sweep_every_queue_of_the_day() {
        let h = harness(5).await;
        h.service.join_queue(join(&h.queue_id, "alice")).await;
        h.service.join_queue(join(&h.queue_id, "bob")).await;
        h.service.call_next(call(&h.queue_id)).await;

        h.clock.advance(Duration::minutes(9));
        let early = h
            .service
            .sweep_late_customers(day(), &ActorId::new("scheduler"))
            .await
            .unwrap();
        assert_eq!(early.customers_evicted, 0);

        h.clock.advance(Duration::minutes(2));
        let late = h
            .service
            .sweep_late_customers(day(), &ActorId::new("scheduler"))
            .await
            .unwrap();
        assert_eq!(late.queues_checked, 1);
        assert_eq!(late.customers_evicted, 1);
        assert_eq!(late.failures, 0);
    }

    #[tokio::test]
    async fn should_block_joins_after_deactivation() {
        let h = harness(5).await;
        let closed = h
            .service
            .set_active(SetQueueActive {
                queue_id: h.queue_id.clone(),
                active: false,
                actor: "owner".to_string(),
            })
            .await;
        assert!(closed.success);

        let result = h.service.join_queue(join(&h.queue_id, "alice")).await;
        assert!(matches!(
            result.errors[0],
            CommandError::General {
                kind: ErrorKind::InvalidState,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_not_save_when_activation_is_a_no_op() {
        let h = harness(5).await;
        let result = h
            .service
            .set_active(SetQueueActive {
                queue_id: h.queue_id.clone(),
                active: true,
                actor: "owner".to_string(),
            })
            .await;
        assert!(result.success);
        let queue = h.service.get_queue(h.queue_id.parse().unwrap()).await.unwrap();
        assert_eq!(queue.version(), 0);
        assert!(h.publisher.types().is_empty());
    }

    #[tokio::test]
    async fn should_update_settings_and_reject_zero_capacity() {
        let h = harness(5).await;
        let ok = h
            .service
            .update_settings(UpdateQueueSettings {
                queue_id: h.queue_id.clone(),
                max_size: 12,
                late_client_cap_minutes: 5,
                actor: "owner".to_string(),
            })
            .await;
        assert!(ok.success);

        let bad = h
            .service
            .update_settings(UpdateQueueSettings {
                queue_id: h.queue_id.clone(),
                max_size: 0,
                late_client_cap_minutes: 5,
                actor: "owner".to_string(),
            })
            .await;
        assert_eq!(bad.field_errors().count(), 1);

        let queue = h.service.get_queue(h.queue_id.parse().unwrap()).await.unwrap();
        assert_eq!(queue.max_size(), 12);
        assert_eq!(queue.late_client_cap_minutes(), 5);
    }

    #[tokio::test]
    async fn should_reuse_existing_queue_when_opening_twice() {
        let service = QueueService::new(
            InMemoryQueueRepository::default(),
            RecordingPublisher::default(),
            ManualClock::new(t0()),
        );
        let location = LocationId::new();
        let first = service.open_queue(location, day(), None).await.unwrap();
        let second = service.open_queue(location, day(), None).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(first.settings(), QueueSettings::default());
    }

    #[tokio::test]
    async fn should_refuse_to_reopen_deactivated_queue() {
        let h = harness(5).await;
        let queue = h.service.get_queue(h.queue_id.parse().unwrap()).await.unwrap();
        h.service
            .set_active(SetQueueActive {
                queue_id: h.queue_id.clone(),
                active: false,
                actor: "owner".to_string(),
            })
            .await;

        let result = h
            .service
            .open_queue(queue.location_id(), queue.queue_date(), None)
            .await;

        assert!(matches!(result, Err(WalkinError::InvalidState(_))));
    }

    async fn flaky_service(
        conflicts: u32,
    ) -> (QueueService<FlakyRepo, RecordingPublisher, ManualClock>, String) {
        let service = QueueService::new(
            FlakyRepo {
                inner: InMemoryQueueRepository::default(),
                conflicts: Mutex::new(conflicts),
            },
            RecordingPublisher::default(),
            ManualClock::new(t0()),
        );
        let queue = service
            .open_queue(LocationId::new(), day(), None)
            .await
            .unwrap();
        (service, queue.id().to_string())
    }

    #[tokio::test]
    async fn should_retry_after_version_conflict() {
        let (service, queue_id) = flaky_service(2).await;

        let result = service.join_queue(join(&queue_id, "alice")).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.position, Some(1));
        let queue = service.get_queue(queue_id.parse().unwrap()).await.unwrap();
        assert_eq!(queue.entries().len(), 1);
    }

    #[tokio::test]
    async fn should_give_up_after_configured_retries() {
        let (service, queue_id) = flaky_service(4).await;

        let result = service.join_queue(join(&queue_id, "alice")).await;

        assert!(!result.success);
        assert!(result.is_retryable());
        let queue = service.get_queue(queue_id.parse().unwrap()).await.unwrap();
        assert!(queue.entries().is_empty());
    }
}
