use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use spicecart_customers::{CustomerEvent, CustomerId, DeliveryAddress, AGGREGATE_TYPE};
use spicecart_events::EventEnvelope;

use crate::projections::cursor::{Position, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerReadModel {
    pub customer_id: CustomerId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: DeliveryAddress,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer directory keyed by id, with a phone index for checkout and order
/// tracking.
#[derive(Debug)]
pub struct CustomerDirectoryProjection<S = InMemoryReadStore<CustomerId, CustomerReadModel>>
where
    S: ReadStore<CustomerId, CustomerReadModel>,
{
    store: S,
    by_phone: InMemoryReadStore<String, CustomerId>,
    cursors: StreamCursors,
}

impl CustomerDirectoryProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> CustomerDirectoryProjection<S>
where
    S: ReadStore<CustomerId, CustomerReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_phone: InMemoryReadStore::new(),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, customer_id: &CustomerId) -> Option<CustomerReadModel> {
        self.store.get(customer_id)
    }

    /// Lookup by an already-normalised phone number.
    pub fn by_phone(&self, phone: &str) -> Option<CustomerReadModel> {
        self.by_phone.get(&phone.to_string()).and_then(|id| self.store.get(&id))
    }

    /// Newest registrations first.
    pub fn list(&self) -> Vec<CustomerReadModel> {
        let mut customers = self.store.list();
        customers.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        customers
    }

    pub fn clear(&self) {
        self.store.clear();
        self.by_phone.clear();
        self.cursors.clear();
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if self.cursors.position(aggregate_id, seq)? == Position::Duplicate {
            return Ok(());
        }

        let ev: CustomerEvent =
            serde_json::from_value(envelope.payload().clone()).map_err(|e| {
                ProjectionError::Deserialize {
                    aggregate_type: AGGREGATE_TYPE.to_string(),
                    message: e.to_string(),
                }
            })?;

        match ev {
            CustomerEvent::CustomerRegistered(e) => {
                if e.customer_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(aggregate_id));
                }
                self.by_phone.upsert(e.phone.clone(), e.customer_id);
                self.store.upsert(
                    e.customer_id,
                    CustomerReadModel {
                        customer_id: e.customer_id,
                        name: e.name,
                        phone: e.phone,
                        email: e.email,
                        address: e.address,
                        registered_at: e.occurred_at,
                        updated_at: envelope.recorded_at(),
                    },
                );
            }
            CustomerEvent::CustomerContactUpdated(e) => {
                if e.customer_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(aggregate_id));
                }
                let Some(mut rm) = self.store.get(&e.customer_id) else {
                    return Err(ProjectionError::NonMonotonicSequence {
                        aggregate_id,
                        last: 0,
                        found: seq,
                    });
                };
                rm.name = e.name;
                rm.email = e.email;
                rm.address = e.address;
                rm.updated_at = envelope.recorded_at();
                self.store.upsert(e.customer_id, rm);
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicecart_customers::{CustomerContactUpdated, CustomerRegistered};
    use spicecart_events::Event;
    use uuid::Uuid;

    fn address(line1: &str) -> DeliveryAddress {
        DeliveryAddress {
            line1: line1.to_string(),
            line2: None,
            landmark: None,
            city: "Kochi".to_string(),
            pincode: "682001".to_string(),
        }
    }

    fn envelope(id: CustomerId, seq: u64, ev: &CustomerEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            AGGREGATE_TYPE,
            seq,
            ev.event_type(),
            Utc::now(),
            serde_json::to_value(ev).unwrap(),
        )
    }

    #[test]
    fn registers_and_updates_by_phone() {
        let p = CustomerDirectoryProjection::in_memory();
        let id = CustomerId::generate();
        let registered = CustomerEvent::CustomerRegistered(CustomerRegistered {
            customer_id: id,
            name: "Anu".to_string(),
            phone: "9847012345".to_string(),
            email: None,
            address: address("12 Rose Street"),
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(id, 1, &registered)).unwrap();
        assert_eq!(p.by_phone("9847012345").unwrap().customer_id, id);

        let updated = CustomerEvent::CustomerContactUpdated(CustomerContactUpdated {
            customer_id: id,
            name: "Anu Thomas".to_string(),
            email: Some("anu@example.com".to_string()),
            address: address("14 Rose Street"),
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(id, 2, &updated)).unwrap();
        p.apply_envelope(&envelope(id, 2, &updated)).unwrap();

        let rm = p.get(&id).unwrap();
        assert_eq!(rm.name, "Anu Thomas");
        assert_eq!(rm.address.line1, "14 Rose Street");
        assert_eq!(p.list().len(), 1);
    }

    #[test]
    fn mismatched_stream_is_rejected() {
        let p = CustomerDirectoryProjection::in_memory();
        let registered = CustomerEvent::CustomerRegistered(CustomerRegistered {
            customer_id: CustomerId::generate(),
            name: "Anu".to_string(),
            phone: "9847012345".to_string(),
            email: None,
            address: address("12 Rose Street"),
            occurred_at: Utc::now(),
        });
        let err = p.apply_envelope(&envelope(CustomerId::generate(), 1, &registered)).unwrap_err();
        assert!(matches!(err, ProjectionError::StreamMismatch(_)));
    }
}
