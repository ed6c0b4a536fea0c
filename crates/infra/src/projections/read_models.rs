use serde_json::Value as JsonValue;
use thiserror::Error;

use spicecart_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError};
use crate::projections::{
    CustomerDirectoryProjection, OrdersProjection, ProductCatalogProjection, ProjectionError,
};

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("failed to load events: {0}")]
    Store(#[from] EventStoreError),

    #[error("failed to project event: {0}")]
    Projection(#[from] ProjectionError),
}

/// Every read model the API queries, updated in the request that commits the
/// events (read-your-writes).
///
/// Acts as the dispatcher's event bus: each committed envelope is routed to the
/// projection for its aggregate type.
#[derive(Debug)]
pub struct ReadModels {
    pub products: ProductCatalogProjection,
    pub customers: CustomerDirectoryProjection,
    pub orders: OrdersProjection,
}

impl Default for ReadModels {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadModels {
    pub fn new() -> Self {
        Self {
            products: ProductCatalogProjection::in_memory(),
            customers: CustomerDirectoryProjection::in_memory(),
            orders: OrdersProjection::in_memory(),
        }
    }

    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            spicecart_products::AGGREGATE_TYPE => self.products.apply_envelope(envelope),
            spicecart_customers::AGGREGATE_TYPE => self.customers.apply_envelope(envelope),
            spicecart_orders::AGGREGATE_TYPE => self.orders.apply_envelope(envelope),
            other => {
                tracing::warn!(aggregate_type = other, "no projection for aggregate type");
                Ok(())
            }
        }
    }

    /// Drop all read-model state and replay the full event log.
    pub async fn rebuild<S>(&self, store: &S) -> Result<usize, RebuildError>
    where
        S: EventStore + ?Sized,
    {
        let events = store.load_all().await?;
        self.products.clear();
        self.customers.clear();
        self.orders.clear();

        for stored in &events {
            self.apply(&stored.to_envelope())?;
        }
        tracing::info!(events = events.len(), "read models rebuilt");
        Ok(events.len())
    }
}

impl EventBus<EventEnvelope<JsonValue>> for ReadModels {
    type Error = ProjectionError;

    fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
        self.apply(&message)
    }
}
