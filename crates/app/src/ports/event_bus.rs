//! Event bus port — hands queue events to notification and audit collaborators.

use std::future::Future;

use walkin_domain::error::WalkinError;
use walkin_domain::event::QueueEvent;

/// Publishes queue events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: QueueEvent) -> impl Future<Output = Result<(), WalkinError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: QueueEvent) -> impl Future<Output = Result<(), WalkinError>> + Send {
        (**self).publish(event)
    }
}
