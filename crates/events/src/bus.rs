//! Publishing boundary between the event store and its consumers.
//!
//! Events are appended to the store first and published afterwards, so the
//! store stays the source of truth. Consumers must tolerate seeing the same
//! envelope twice (a replay at start-up followed by a late publish, for example).

use std::sync::Arc;

/// Fan-out of committed events to read models.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }
}
