//! Gateway webhook bodies.
//!
//! Only the fields the storefront acts on are parsed; everything else in the
//! payload is ignored.

use serde::Deserialize;
use thiserror::Error;

use spicecart_core::Money;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// `payment.captured` or `order.paid`.
    PaymentCaptured {
        gateway_order_id: String,
        payment_id: String,
        amount: Money,
    },
    /// `payment.failed`.
    PaymentFailed {
        gateway_order_id: String,
        payment_id: String,
        reason: String,
    },
    /// Any other event name; acknowledged and dropped.
    Ignored(String),
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed webhook body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("webhook '{0}' is missing the payment entity")]
    MissingPayment(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    payment: Option<Wrapped<PaymentEntity>>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    #[serde(default)]
    order_id: Option<String>,
    amount: u64,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_reason: Option<String>,
}

pub fn parse_webhook(body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    let kind = envelope.event.as_str();
    if !matches!(kind, "payment.captured" | "payment.failed" | "order.paid") {
        return Ok(WebhookEvent::Ignored(envelope.event));
    }

    let payment = envelope
        .payload
        .payment
        .ok_or_else(|| WebhookError::MissingPayment(envelope.event.clone()))?
        .entity;
    // Payments taken outside a gateway order (payment links, QR) have nothing
    // to reconcile against.
    let Some(gateway_order_id) = payment.order_id.filter(|id| !id.is_empty()) else {
        return Ok(WebhookEvent::Ignored(envelope.event));
    };

    if kind == "payment.failed" {
        let reason = payment
            .error_description
            .or(payment.error_reason)
            .unwrap_or_else(|| "payment failed".to_string());
        return Ok(WebhookEvent::PaymentFailed {
            gateway_order_id,
            payment_id: payment.id,
            reason,
        });
    }

    Ok(WebhookEvent::PaymentCaptured {
        gateway_order_id,
        payment_id: payment.id,
        amount: Money::from_paise(payment.amount),
    })
}
