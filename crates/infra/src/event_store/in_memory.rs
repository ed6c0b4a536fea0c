use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use spicecart_core::{AggregateId, ExpectedVersion};

use super::r#trait::{validate_batch, EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Default)]
struct Streams {
    by_aggregate: HashMap<AggregateId, Vec<StoredEvent>>,
    /// Commit order across all streams.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// Dev/test double for the Postgres store. Everything is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        let (aggregate_id, aggregate_type) = validate_batch(&events)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        let Streams { by_aggregate, log } = &mut *streams;

        let stream = by_aggregate.entry(aggregate_id).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let recorded_at = Utc::now();
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                recorded_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            log.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    async fn load_stream(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(streams.by_aggregate.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(streams.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn event(aggregate_id: AggregateId, aggregate_type: &str, n: u32) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.thing.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({ "n": n }),
        }
    }

    #[tokio::test]
    async fn assigns_contiguous_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let first = store
            .append(vec![event(id, "t", 1), event(id, "t", 2)], ExpectedVersion::Exact(0))
            .await
            .unwrap();
        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), vec![1, 2]);

        let second = store
            .append(vec![event(id, "t", 3)], ExpectedVersion::Exact(2))
            .await
            .unwrap();
        assert_eq!(second[0].sequence_number, 3);

        let loaded = store.load_stream(id).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].payload, json!({ "n": 3 }));
    }

    #[tokio::test]
    async fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store.append(vec![event(id, "t", 1)], ExpectedVersion::Exact(0)).await.unwrap();

        let err = store
            .append(vec![event(id, "t", 2)], ExpectedVersion::Exact(0))
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.load_stream(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn aggregate_type_is_fixed_per_stream() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store.append(vec![event(id, "a", 1)], ExpectedVersion::Any).await.unwrap();

        let err = store.append(vec![event(id, "b", 2)], ExpectedVersion::Any).await.unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }

    #[tokio::test]
    async fn mixed_batches_are_rejected() {
        let store = InMemoryEventStore::new();
        let err = store
            .append(
                vec![event(AggregateId::new(), "t", 1), event(AggregateId::new(), "t", 2)],
                ExpectedVersion::Any,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
    }

    #[tokio::test]
    async fn load_all_returns_commit_order() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();
        store.append(vec![event(a, "t", 1)], ExpectedVersion::Any).await.unwrap();
        store.append(vec![event(b, "t", 2)], ExpectedVersion::Any).await.unwrap();
        store.append(vec![event(a, "t", 3)], ExpectedVersion::Any).await.unwrap();

        let all = store.load_all().await.unwrap();
        let seen: Vec<_> = all.iter().map(|e| (e.aggregate_id, e.sequence_number)).collect();
        assert_eq!(seen, vec![(a, 1), (b, 1), (a, 2)]);
    }

    #[tokio::test]
    async fn unknown_stream_is_empty() {
        let store = InMemoryEventStore::new();
        assert!(store.load_stream(AggregateId::new()).await.unwrap().is_empty());
    }
}
