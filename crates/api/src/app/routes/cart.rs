use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use spicecart_orders::{price_cart, CartItem, DeliveryError};
use spicecart_products::ProductId;

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/quote", post(quote))
        .route("/delivery-check", post(delivery_check))
}

/// Parse client cart lines. Quantities are validated by the pricer.
pub fn cart_items(
    items: &[dto::CartItemRequest],
) -> Result<Vec<CartItem>, axum::response::Response> {
    items
        .iter()
        .map(|item| {
            let product_id = item
                .product_id
                .parse::<ProductId>()
                .map_err(|_| errors::invalid_id("product"))?;
            Ok(CartItem {
                product_id,
                quantity: item.quantity,
            })
        })
        .collect()
}

pub async fn quote(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CartQuoteRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let items = match cart_items(&body.items) {
        Ok(items) => items,
        Err(res) => return res,
    };

    match price_cart(&items, &services.read_models().products, services.delivery()) {
        Ok(quote) => Json(dto::QuoteResponse {
            quote,
            delivery_city: services.delivery().city.clone(),
        })
        .into_response(),
        Err(e) => errors::cart_error_to_response(e),
    }
}

/// Serviceability check for the checkout form. Always 200; `deliverable`
/// carries the answer.
pub async fn delivery_check(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::DeliveryCheckRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    let policy = services.delivery();
    let answer = match policy.check(&body.city, &body.pincode) {
        Ok(()) => serde_json::json!({
            "deliverable": true,
            "city": policy.city,
            "delivery_fee": policy.delivery_fee,
            "free_delivery_threshold": policy.free_delivery_threshold,
        }),
        Err(e) => {
            let reason = match &e {
                DeliveryError::CityNotServed { .. } => "city_not_served",
                DeliveryError::InvalidPincode => "invalid_pincode",
                DeliveryError::PincodeNotServed(_) => "pincode_not_served",
            };
            serde_json::json!({
                "deliverable": false,
                "city": policy.city,
                "reason": reason,
                "message": e.to_string(),
            })
        }
    };
    Json(answer).into_response()
}
