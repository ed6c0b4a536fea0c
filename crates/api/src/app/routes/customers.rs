use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use spicecart_auth::Permission;
use spicecart_customers::CustomerId;

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers))
        .route("/:id", get(get_customer))
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::CUSTOMERS_READ) {
        return res;
    }
    Json(services.read_models().customers.list()).into_response()
}

/// Customer record with their orders, newest first.
pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::CUSTOMERS_READ) {
        return res;
    }
    let Ok(customer_id) = id.parse::<CustomerId>() else {
        return errors::invalid_id("customer");
    };
    let Some(customer) = services.read_models().customers.get(&customer_id) else {
        return errors::not_found("customer");
    };

    let orders = services
        .read_models()
        .orders
        .for_customer(customer_id)
        .iter()
        .map(dto::OrderSummary::from)
        .collect();
    Json(dto::CustomerDetailResponse { customer, orders }).into_response()
}
