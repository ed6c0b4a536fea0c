//! Razorpay Orders API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::gateway::{CreateGatewayOrder, GatewayError, GatewayOrder, PaymentGateway};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    /// e.g. `https://api.razorpay.com`
    pub api_base: String,
    pub key_id: String,
    pub key_secret: String,
}

pub struct RazorpayGateway {
    client: reqwest::Client,
    config: RazorpayConfig,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    #[instrument(
        skip(self, request),
        fields(receipt = %request.receipt, amount = request.amount.paise()),
        err
    )]
    async fn create_order(
        &self,
        request: &CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError> {
        let body = json!({
            "amount": request.amount.paise(),
            "currency": request.currency,
            "receipt": request.receipt,
            "notes": request.notes,
        });

        let response = self
            .client
            .post(self.orders_url())
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error.description.or(b.error.code))
                .unwrap_or(text);
            warn!(status = status.as_u16(), %message, "razorpay rejected order creation");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if order.amount != request.amount.paise() {
            return Err(GatewayError::InvalidResponse(format!(
                "gateway order amount {} differs from requested {}",
                order.amount,
                request.amount.paise()
            )));
        }

        info!(gateway_order_id = %order.id, "razorpay order created");
        Ok(order)
    }
}
