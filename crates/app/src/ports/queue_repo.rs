//! Queue repository port — persistence for the queue aggregate.
//!
//! Implementations store a queue together with all of its entries and must
//! round-trip entry order and every timestamp verbatim.
//!
//! Concurrency: [`QueueRepository::save`] is a compare-and-swap on
//! [`Queue::version`]. When the stored version differs from the one the
//! caller loaded, it fails with [`WalkinError::Conflict`] and writes nothing;
//! the caller reloads and retries.

use std::future::Future;

use walkin_domain::error::WalkinError;
use walkin_domain::id::{LocationId, QueueId};
use walkin_domain::queue::Queue;
use walkin_domain::time::QueueDate;

/// Repository for persisting and loading [`Queue`] aggregates.
pub trait QueueRepository {
    /// Store a brand-new queue.
    ///
    /// Fails with [`WalkinError::Conflict`] when the location already has a
    /// queue for that day.
    fn create(&self, queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send;

    /// Get a queue and its entries by identifier.
    fn get_by_id(
        &self,
        id: QueueId,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send;

    /// Get the active queue of a location for a given day.
    fn get_active_by_location(
        &self,
        location_id: LocationId,
        date: QueueDate,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send;

    /// Every queue (active or not) for a given day.
    fn list_for_date(
        &self,
        date: QueueDate,
    ) -> impl Future<Output = Result<Vec<Queue>, WalkinError>> + Send;

    /// Persist changes to an existing queue.
    ///
    /// Returns the queue carrying its new version.
    fn save(&self, queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send;
}

impl<T: QueueRepository + Send + Sync> QueueRepository for std::sync::Arc<T> {
    fn create(&self, queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send {
        (**self).create(queue)
    }

    fn get_by_id(
        &self,
        id: QueueId,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_active_by_location(
        &self,
        location_id: LocationId,
        date: QueueDate,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send {
        (**self).get_active_by_location(location_id, date)
    }

    fn list_for_date(
        &self,
        date: QueueDate,
    ) -> impl Future<Output = Result<Vec<Queue>, WalkinError>> + Send {
        (**self).list_for_date(date)
    }

    fn save(&self, queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send {
        (**self).save(queue)
    }
}
