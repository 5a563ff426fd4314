//! In-memory [`QueueRepository`] for tests and embedding.
//!
//! Behaves like the persistent adapters: `save` is a compare-and-swap on the
//! queue version, and one location holds at most one queue per day.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use walkin_domain::error::{ConflictError, NotFoundError, WalkinError};
use walkin_domain::id::{LocationId, QueueId};
use walkin_domain::queue::Queue;
use walkin_domain::time::QueueDate;

use crate::ports::QueueRepository;

type Store = Arc<Mutex<HashMap<QueueId, Queue>>>;

/// Mutex-guarded map of queues keyed by id.
///
/// Every operation touches the map only once its future is polled, so a
/// dropped future leaves the store as it was.
#[derive(Default)]
pub struct InMemoryQueueRepository {
    store: Store,
}

fn lock(store: &Store) -> MutexGuard<'_, HashMap<QueueId, Queue>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

fn conflict(queue: &Queue) -> WalkinError {
    ConflictError {
        queue_id: queue.id().to_string(),
        expected_version: queue.version(),
    }
    .into()
}

impl QueueRepository for InMemoryQueueRepository {
    fn create(&self, queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send {
        let store = Arc::clone(&self.store);
        async move {
            let mut store = lock(&store);
            let taken = store.values().any(|existing| {
                existing.id() == queue.id()
                    || (existing.location_id() == queue.location_id()
                        && existing.queue_date() == queue.queue_date())
            });
            if taken {
                return Err(conflict(&queue));
            }
            store.insert(queue.id(), queue.clone());
            Ok(queue)
        }
    }

    fn get_by_id(
        &self,
        id: QueueId,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send {
        let store = Arc::clone(&self.store);
        async move { Ok(lock(&store).get(&id).cloned()) }
    }

    fn get_active_by_location(
        &self,
        location_id: LocationId,
        date: QueueDate,
    ) -> impl Future<Output = Result<Option<Queue>, WalkinError>> + Send {
        let store = Arc::clone(&self.store);
        async move {
            Ok(lock(&store)
                .values()
                .find(|q| q.is_active() && q.location_id() == location_id && q.queue_date() == date)
                .cloned())
        }
    }

    fn list_for_date(
        &self,
        date: QueueDate,
    ) -> impl Future<Output = Result<Vec<Queue>, WalkinError>> + Send {
        let store = Arc::clone(&self.store);
        async move {
            Ok(lock(&store)
                .values()
                .filter(|q| q.queue_date() == date)
                .cloned()
                .collect())
        }
    }

    fn save(&self, mut queue: Queue) -> impl Future<Output = Result<Queue, WalkinError>> + Send {
        let store = Arc::clone(&self.store);
        async move {
            let mut store = lock(&store);
            match store.get(&queue.id()).map(Queue::version) {
                None => Err(NotFoundError {
                    entity: "Queue",
                    id: queue.id().to_string(),
                }
                .into()),
                Some(version) if version != queue.version() => Err(conflict(&queue)),
                Some(_) => {
                    queue.set_version(queue.version() + 1);
                    store.insert(queue.id(), queue.clone());
                    Ok(queue)
                }
            }
        }
    }
}
