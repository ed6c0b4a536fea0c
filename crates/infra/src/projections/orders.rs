use serde_json::Value as JsonValue;

use spicecart_core::Aggregate;
use spicecart_customers::CustomerId;
use spicecart_events::EventEnvelope;
use spicecart_orders::{Order, OrderEvent, OrderId, OrderStatus, AGGREGATE_TYPE};

use crate::projections::cursor::{Position, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

/// Orders read model.
///
/// Each record is the order aggregate folded from its own events, so reads see
/// exactly the state the aggregate enforces. Secondary indexes resolve gateway
/// order ids (payment callbacks and webhooks), idempotency keys (retried
/// checkouts) and human-facing order numbers (tracking).
#[derive(Debug)]
pub struct OrdersProjection<S = InMemoryReadStore<OrderId, Order>>
where
    S: ReadStore<OrderId, Order>,
{
    store: S,
    by_gateway_order: InMemoryReadStore<String, OrderId>,
    by_idempotency_key: InMemoryReadStore<String, OrderId>,
    by_number: InMemoryReadStore<String, OrderId>,
    cursors: StreamCursors,
}

impl OrdersProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, Order>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_gateway_order: InMemoryReadStore::new(),
            by_idempotency_key: InMemoryReadStore::new(),
            by_number: InMemoryReadStore::new(),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<Order> {
        self.store.get(order_id)
    }

    pub fn by_gateway_order_id(&self, gateway_order_id: &str) -> Option<Order> {
        self.by_gateway_order
            .get(&gateway_order_id.to_string())
            .and_then(|id| self.store.get(&id))
    }

    pub fn by_idempotency_key(&self, key: &str) -> Option<Order> {
        self.by_idempotency_key.get(&key.to_string()).and_then(|id| self.store.get(&id))
    }

    pub fn by_number(&self, order_number: &str) -> Option<Order> {
        self.by_number
            .get(&order_number.trim().to_ascii_uppercase())
            .and_then(|id| self.store.get(&id))
    }

    /// Newest first, optionally restricted to one status.
    pub fn list(&self, status: Option<OrderStatus>) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .store
            .list()
            .into_iter()
            .filter(|o| status.is_none_or(|s| o.status() == s))
            .collect();
        orders.sort_by(|a, b| {
            b.placed_at()
                .cmp(&a.placed_at())
                .then_with(|| b.order_number().cmp(a.order_number()))
        });
        orders
    }

    pub fn for_customer(&self, customer_id: CustomerId) -> Vec<Order> {
        let mut orders = self.list(None);
        orders.retain(|o| o.customer_id() == Some(customer_id));
        orders
    }

    pub fn clear(&self) {
        self.store.clear();
        self.by_gateway_order.clear();
        self.by_idempotency_key.clear();
        self.by_number.clear();
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

        let ev: OrderEvent =
            serde_json::from_value(envelope.payload().clone()).map_err(|e| {
                ProjectionError::Deserialize {
                    aggregate_type: AGGREGATE_TYPE.to_string(),
                    message: e.to_string(),
                }
            })?;

        let event_order_id = match &ev {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::GatewayOrderAttached(e) => e.order_id,
            OrderEvent::PaymentCaptured(e) => e.order_id,
            OrderEvent::PaymentFailed(e) => e.order_id,
            OrderEvent::OrderStatusChanged(e) => e.order_id,
        };
        if event_order_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id));
        }

        match &ev {
            OrderEvent::OrderPlaced(e) => {
                self.by_number.upsert(e.order_number.clone(), e.order_id);
                if let Some(key) = &e.idempotency_key {
                    self.by_idempotency_key.upsert(key.clone(), e.order_id);
                }
            }
            OrderEvent::GatewayOrderAttached(e) => {
                self.by_gateway_order.upsert(e.gateway_order_id.clone(), e.order_id);
            }
            _ => {}
        }

        let mut order = self
            .store
            .get(&event_order_id)
            .unwrap_or_else(|| Order::empty(event_order_id));
        order.apply(&ev);
        self.store.upsert(event_order_id, order);

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}
