use async_trait::async_trait;
use uuid::Uuid;

use crate::gateway::{CreateGatewayOrder, GatewayError, GatewayOrder, PaymentGateway};

/// Local stand-in gateway for development and tests.
///
/// Mints `order_offline_<hex>` ids without any network call. Signatures are
/// still verified with the configured key secret, so the checkout flow can be
/// exercised end to end by signing locally.
#[derive(Debug, Clone)]
pub struct OfflineGateway {
    key_id: String,
}

impl OfflineGateway {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self { key_id: key_id.into() }
    }
}

#[async_trait]
impl PaymentGateway for OfflineGateway {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(
        &self,
        request: &CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError> {
        let simple = Uuid::now_v7().simple().to_string();
        let suffix = &simple[simple.len() - 14..];
        Ok(GatewayOrder {
            id: format!("order_offline_{suffix}"),
            amount: request.amount.paise(),
            currency: request.currency.clone(),
            receipt: Some(request.receipt.clone()),
            status: "created".to_string(),
        })
    }
}
