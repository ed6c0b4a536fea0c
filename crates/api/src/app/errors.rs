use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{json, Value as JsonValue};

use spicecart_core::DomainError;
use spicecart_infra::command_dispatcher::DispatchError;
use spicecart_orders::{CartError, DeliveryError};
use spicecart_payments::{GatewayError, SignatureError};

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "stored event failed to deserialize");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => {
            tracing::error!(error = %msg, "read model update failed after commit");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    dispatch_error_to_response(DispatchError::from(err))
}

pub fn cart_error_to_response(err: CartError) -> axum::response::Response {
    match err {
        CartError::UnknownProduct(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        CartError::Amount(e) => domain_error_to_response(e),
        other => json_error(StatusCode::BAD_REQUEST, "validation_error", other.to_string()),
    }
}

pub fn delivery_error_to_response(err: DeliveryError) -> axum::response::Response {
    match err {
        DeliveryError::InvalidPincode => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        other => json_error(StatusCode::BAD_REQUEST, "undeliverable", other.to_string()),
    }
}

pub fn gateway_error_to_response(err: GatewayError) -> axum::response::Response {
    tracing::error!(error = %err, "payment gateway call failed");
    json_error(StatusCode::BAD_GATEWAY, "gateway_error", err.to_string())
}

pub fn signature_error_to_response(err: SignatureError) -> axum::response::Response {
    match err {
        SignatureError::MissingSecret => {
            tracing::error!("payment signing secret is not configured");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string())
        }
        other => json_error(StatusCode::BAD_REQUEST, "invalid_signature", other.to_string()),
    }
}

pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

pub fn not_found(what: &str) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Error envelope with a structured `details` payload.
pub fn json_error_with_details(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: JsonValue,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}
