//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream from the store
//!   ↓
//! 2. Rehydrate (apply historical events in sequence order)
//!   ↓
//! 3. Handle the command (pure decision, produces events; none means no-op)
//!   ↓
//! 4. Append with an exact expected version (optimistic concurrency)
//!   ↓
//! 5. Publish the committed events to the read models
//! ```
//!
//! The module contains no IO of its own; it composes `EventStore` and `EventBus`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use spicecart_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use spicecart_events::{Event, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The stream moved between load and append.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// The command contradicts recorded state (duplicate create, different payment id, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A stored payload no longer deserialises into the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Read models rejected an event after it was committed. The event is durable;
    /// a restart rebuilds the read models from the store.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::NotFound(what) => DispatchError::NotFound(what),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
        }
    }
}

/// Runs commands against event-sourced aggregates.
///
/// Events are appended before they are published, so a publish failure never
/// loses data. An idempotent command (one the aggregate answers with no events)
/// commits nothing and returns an empty vector.
///
/// Append and publish happen under one lock: projections require each stream's
/// events in sequence order, and two commands on the same aggregate would
/// otherwise be able to publish out of commit order.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    commit: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            commit: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through load, rehydrate, handle, append and publish.
    ///
    /// `make_aggregate` builds the empty instance history is applied to (for
    /// example `Order::empty`). Returns the committed events with their assigned
    /// sequence numbers.
    pub async fn dispatch<A, F>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: F,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Send,
        A::Command: Send,
        A::Event: Event + Serialize + DeserializeOwned,
        F: FnOnce(AggregateId) -> A + Send,
    {
        let history = self.store.load_stream(aggregate_id).await?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            tracing::debug!(%aggregate_id, aggregate_type, "command produced no events");
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let _commit = self.commit.lock().await;
        let committed = self.store.append(uncommitted, expected).await?;
        tracing::debug!(
            %aggregate_id,
            aggregate_type,
            events = committed.len(),
            version = stream_version(&committed),
            "events committed"
        );

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(e.to_string()))?;
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate without handling a command.
    pub async fn load<A, F>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: F,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate + Send,
        A::Event: DeserializeOwned,
        F: FnOnce(AggregateId) -> A + Send,
    {
        let history = self.store.load_stream(aggregate_id).await?;
        validate_loaded_stream(aggregate_id, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// The stream must belong to `aggregate_id` and be numbered 1, 2, 3, ...
fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        let expected = idx as u64 + 1;
        if e.sequence_number != expected {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (expected {expected}, found {})",
                e.sequence_number
            ))));
        }
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: Vec<StoredEvent>) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
