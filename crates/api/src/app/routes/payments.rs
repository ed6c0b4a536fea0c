//! Online payment flow.
//!
//! 1. `POST /orders` opens a gateway order for a placed online order.
//! 2. The browser checkout posts the signed result to `POST /verify`.
//! 3. The gateway independently confirms via `POST /webhook`.
//!
//! Steps 2 and 3 race; capture is idempotent on the payment id, so whichever
//! lands second commits nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use spicecart_core::Money;
use spicecart_orders::{
    AttachGatewayOrder, CapturePayment, FailPayment, OrderCommand, OrderId, OrderStatus,
    PaymentMethod,
};
use spicecart_payments::{
    parse_webhook, verify_checkout_signature, verify_webhook_signature, CreateGatewayOrder,
    WebhookEvent,
};

use crate::app::routes::orders::dispatch_order;
use crate::app::{dto, errors, services::AppServices};

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(create_payment_order))
        .route("/verify", post(verify_payment))
        .route("/webhook", post(webhook))
}

/// Open (or return the already open) gateway order for an online order.
pub async fn create_payment_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreatePaymentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let Ok(order_id) = body.order_id.parse::<OrderId>() else {
        return errors::invalid_id("order");
    };
    let Some(order) = services.read_models().orders.get(&order_id) else {
        return errors::not_found("order");
    };

    if order.payment().method != PaymentMethod::Online {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "order is cash on delivery",
        );
    }
    if order.is_paid() {
        return errors::json_error(StatusCode::CONFLICT, "conflict", "order is already paid");
    }
    if order.status() == OrderStatus::Cancelled {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "order is cancelled",
        );
    }

    let gateway = services.gateway();
    let respond = |status: StatusCode, gateway_order_id: String, events_committed: usize| {
        (
            status,
            Json(dto::PaymentOrderResponse {
                order_id,
                order_number: order.order_number().to_string(),
                gateway: gateway.name(),
                key_id: gateway.key_id().to_string(),
                gateway_order_id,
                amount: order.total(),
                currency: Money::CURRENCY,
                events_committed,
            }),
        )
            .into_response()
    };

    if let Some(existing) = order.payment().gateway_order_id.clone() {
        return respond(StatusCode::OK, existing, 0);
    }

    let request = CreateGatewayOrder {
        amount: order.total(),
        currency: Money::CURRENCY.to_string(),
        receipt: order.order_number().to_string(),
        notes: BTreeMap::from([("order_id".to_string(), order_id.to_string())]),
    };
    let gateway_order = match gateway.create_order(&request).await {
        Ok(g) => g,
        Err(e) => return errors::gateway_error_to_response(e),
    };

    let cmd = OrderCommand::AttachGatewayOrder(AttachGatewayOrder {
        order_id,
        gateway_order_id: gateway_order.id.clone(),
        occurred_at: Utc::now(),
    });
    let committed = match dispatch_order(&services, order_id, cmd).await {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    tracing::info!(
        %order_id,
        gateway = gateway.name(),
        gateway_order_id = %gateway_order.id,
        amount = order.total().paise(),
        "gateway order opened"
    );
    respond(StatusCode::CREATED, gateway_order.id, committed)
}

/// Checkout callback: verify `HMAC(key_secret, "<gateway order>|<payment>")`
/// and capture the payment.
pub async fn verify_payment(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::VerifyPaymentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    if let Err(e) = verify_checkout_signature(
        &services.payments().key_secret,
        &body.razorpay_order_id,
        &body.razorpay_payment_id,
        &body.razorpay_signature,
    ) {
        tracing::warn!(
            gateway_order_id = %body.razorpay_order_id,
            payment_id = %body.razorpay_payment_id,
            error = %e,
            "checkout signature rejected"
        );
        return errors::signature_error_to_response(e);
    }

    let orders = &services.read_models().orders;
    let Some(order) = orders.by_gateway_order_id(&body.razorpay_order_id) else {
        return errors::not_found("order");
    };
    let order_id = order.id_typed();
    if let Some(claimed) = body.order_id.as_deref() {
        if claimed.trim() != order_id.to_string() {
            return errors::json_error(
                StatusCode::CONFLICT,
                "conflict",
                "gateway order belongs to a different order",
            );
        }
    }

    let cmd = OrderCommand::CapturePayment(CapturePayment {
        order_id,
        gateway_order_id: body.razorpay_order_id.clone(),
        payment_id: body.razorpay_payment_id.clone(),
        amount: None,
        occurred_at: Utc::now(),
    });
    let committed = match dispatch_order(&services, order_id, cmd).await {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    if committed > 0 {
        tracing::info!(
            %order_id,
            payment_id = %body.razorpay_payment_id,
            "payment captured via checkout"
        );
    }

    payment_outcome(&services, order_id, committed)
}

/// Gateway webhook. The signature covers the raw body, so the body is read as
/// bytes and only parsed after verification.
pub async fn webhook(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("webhook without signature header");
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_signature",
            "missing X-Razorpay-Signature",
        );
    };
    let secret = &services.payments().webhook_secret;
    if let Err(e) = verify_webhook_signature(secret, &body, signature) {
        tracing::warn!(error = %e, "webhook signature rejected");
        return errors::signature_error_to_response(e);
    }

    let event = match parse_webhook(&body) {
        Ok(ev) => ev,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
        }
    };

    let gateway_order_id = match &event {
        WebhookEvent::Ignored(name) => {
            tracing::debug!(event = %name, "webhook ignored");
            return Json(serde_json::json!({ "status": "ignored", "event": name })).into_response();
        }
        WebhookEvent::PaymentCaptured { gateway_order_id, .. }
        | WebhookEvent::PaymentFailed { gateway_order_id, .. } => gateway_order_id.clone(),
    };

    // Unknown orders are acknowledged so the gateway stops retrying.
    let Some(order) = services.read_models().orders.by_gateway_order_id(&gateway_order_id) else {
        tracing::warn!(%gateway_order_id, "webhook for unknown gateway order");
        return Json(serde_json::json!({ "status": "unknown_order" })).into_response();
    };
    let order_id = order.id_typed();

    let cmd = match event {
        WebhookEvent::PaymentCaptured {
            gateway_order_id,
            payment_id,
            amount,
        } => OrderCommand::CapturePayment(CapturePayment {
            order_id,
            gateway_order_id,
            payment_id,
            amount: Some(amount),
            occurred_at: Utc::now(),
        }),
        WebhookEvent::PaymentFailed {
            payment_id, reason, ..
        } => OrderCommand::FailPayment(FailPayment {
            order_id,
            payment_id: Some(payment_id),
            reason,
            occurred_at: Utc::now(),
        }),
        WebhookEvent::Ignored(name) => {
            return Json(serde_json::json!({ "status": "ignored", "event": name })).into_response();
        }
    };

    let committed = match dispatch_order(&services, order_id, cmd).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(
                %order_id,
                %gateway_order_id,
                error = %e,
                "webhook could not be applied"
            );
            return errors::dispatch_error_to_response(e);
        }
    };
    if committed > 0 {
        tracing::info!(%order_id, %gateway_order_id, "payment state updated via webhook");
    }

    payment_outcome(&services, order_id, committed)
}

fn payment_outcome(
    services: &AppServices,
    order_id: OrderId,
    committed: usize,
) -> axum::response::Response {
    let Some(order) = services.read_models().orders.get(&order_id) else {
        return errors::not_found("order");
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "processed",
            "order_id": order_id.to_string(),
            "order_status": order.status(),
            "payment_status": order.payment().status,
            "events_committed": committed,
        })),
    )
        .into_response()
}
