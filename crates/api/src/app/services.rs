use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

use spicecart_core::{Aggregate, AggregateId, DomainError};
use spicecart_events::Event;
use spicecart_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{EventStore, InMemoryEventStore, StoredEvent},
    projections::RebuildError,
    AppConfig, GatewayKind, PaymentsConfig, Persistence, ReadModels,
};
use spicecart_orders::DeliveryPolicy;
use spicecart_payments::{OfflineGateway, PaymentGateway, RazorpayConfig, RazorpayGateway};

#[cfg(feature = "postgres")]
use spicecart_infra::event_store::PostgresEventStore;

pub type Dispatcher = CommandDispatcher<Arc<dyn EventStore>, Arc<ReadModels>>;

/// Everything a handler needs: the command path, the read models it updates
/// synchronously, and the payment gateway.
pub struct AppServices {
    dispatcher: Dispatcher,
    read_models: Arc<ReadModels>,
    gateway: Arc<dyn PaymentGateway>,
    payments: PaymentsConfig,
    delivery: DeliveryPolicy,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store = build_event_store(&config.persistence).await?;

    let read_models = Arc::new(ReadModels::new());
    let replayed = read_models
        .rebuild(store.as_ref())
        .await
        .context("failed to rebuild read models")?;
    tracing::info!(events = replayed, "read models ready");

    let gateway = build_gateway(&config.payments)?;
    tracing::info!(
        gateway = gateway.name(),
        key_id = gateway.key_id(),
        "payment gateway configured"
    );

    Ok(AppServices {
        dispatcher: CommandDispatcher::new(store, read_models.clone()),
        read_models,
        gateway,
        payments: config.payments.clone(),
        delivery: config.delivery.clone(),
    })
}

async fn build_event_store(persistence: &Persistence) -> anyhow::Result<Arc<dyn EventStore>> {
    match persistence {
        Persistence::InMemory => {
            tracing::info!("using in-memory event store");
            let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
            Ok(store)
        }
        #[cfg(feature = "postgres")]
        Persistence::Postgres { database_url } => {
            let store = PostgresEventStore::connect(database_url)
                .await
                .context("failed to connect to postgres")?;
            store.ensure_schema().await.context("failed to create event schema")?;
            tracing::info!("using postgres event store");
            let store: Arc<dyn EventStore> = Arc::new(store);
            Ok(store)
        }
        #[cfg(not(feature = "postgres"))]
        Persistence::Postgres { .. } => {
            anyhow::bail!(
                "USE_PERSISTENT_STORES=true but this binary was built without the `postgres` feature"
            )
        }
    }
}

fn build_gateway(payments: &PaymentsConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match payments.gateway {
        GatewayKind::Razorpay => {
            let gateway = RazorpayGateway::new(RazorpayConfig {
                api_base: payments.api_base.clone(),
                key_id: payments.key_id.clone(),
                key_secret: payments.key_secret.clone(),
            })
            .context("failed to build razorpay client")?;
            let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway);
            Ok(gateway)
        }
        GatewayKind::Offline => {
            tracing::warn!("using offline payment gateway; no real payments will be taken");
            let gateway: Arc<dyn PaymentGateway> =
                Arc::new(OfflineGateway::new(payments.key_id.clone()));
            Ok(gateway)
        }
    }
}

impl AppServices {
    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }

    pub fn payments(&self) -> &PaymentsConfig {
        &self.payments
    }

    pub fn delivery(&self) -> &DeliveryPolicy {
        &self.delivery
    }

    /// Clear the read models and replay the whole event log into them.
    pub async fn rebuild_read_models(&self) -> Result<usize, RebuildError> {
        self.read_models.rebuild(self.dispatcher.store().as_ref()).await
    }

    /// Dispatch a command through the event-sourced pipeline.
    pub async fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A + Send,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Send,
        A::Command: Send,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn offline_configuration_builds_in_memory_services() {
        let config = AppConfig::from_map(&HashMap::new()).unwrap();
        let services = build_services(&config).await.unwrap();
        assert_eq!(services.gateway().name(), "offline");
        assert!(services.read_models().orders.list(None).is_empty());
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn persistent_stores_require_the_postgres_feature() {
        let vars = HashMap::from([
            ("USE_PERSISTENT_STORES".to_string(), "true".to_string()),
            ("DATABASE_URL".to_string(), "postgres://localhost/spicecart".to_string()),
        ]);
        let config = AppConfig::from_map(&vars).unwrap();
        assert!(build_services(&config).await.is_err());
    }
}
