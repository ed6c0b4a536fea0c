use chrono::{DateTime, Utc};

/// A fact recorded by an aggregate.
///
/// Events are immutable once appended. `event_type` is the stable name stored
/// next to the payload (e.g. `"orders.order.placed"`) and `version` is its
/// schema revision.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time of the fact, not the time it was persisted.
    fn occurred_at(&self) -> DateTime<Utc>;
}
