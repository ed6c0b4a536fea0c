use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use spicecart_core::Money;

/// Request to open a payment on the gateway side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateGatewayOrder {
    pub amount: Money,
    pub currency: String,
    /// Our reference, shown in the gateway dashboard (the order number).
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

/// Gateway-side order, as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Payment gateway seam.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short name for logs ("razorpay", "offline").
    fn name(&self) -> &'static str;

    /// Public key id handed to the browser checkout.
    fn key_id(&self) -> &str;

    async fn create_order(
        &self,
        request: &CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError>;
}
