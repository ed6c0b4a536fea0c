use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};

use spicecart_auth::Permission;
use spicecart_core::{Aggregate, AggregateId, Money};
use spicecart_customers::{
    normalize_phone, Customer, CustomerCommand, CustomerId, DeliveryAddress, RegisterCustomer,
    UpdateContact,
};
use spicecart_infra::command_dispatcher::DispatchError;
use spicecart_orders::{
    order_number, price_cart, ChangeStatus, ContactSnapshot, Order, OrderCommand, OrderId,
    OrderStatus, PlaceOrder,
};

use crate::app::routes::cart::cart_items;
use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

pub fn public_router() -> Router {
    Router::new()
        .route("/", post(place_order))
        .route("/track", get(track_order))
        .route("/:id", get(get_order))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id", get(admin_get_order))
        .route("/:id/status", patch(change_status))
}

// -------------------------
// Storefront
// -------------------------

/// Checkout: re-price the cart server-side, validate the order, upsert the
/// customer by phone and place the order.
///
/// A repeated `Idempotency-Key` returns the order it first created (200)
/// instead of placing a second one.
pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Result<Json<dto::PlaceOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    let idempotency_key = match idempotency_key(&headers) {
        Ok(k) => k,
        Err(res) => return res,
    };
    if let Some(key) = idempotency_key.as_deref() {
        if let Some(existing) = services.read_models().orders.by_idempotency_key(key) {
            tracing::info!(order_number = existing.order_number(), "idempotent checkout replay");
            return (
                StatusCode::OK,
                Json(dto::PlaceOrderResponse {
                    order: dto::OrderResponse::from(&existing),
                    created: false,
                    events_committed: 0,
                }),
            )
                .into_response();
        }
    }

    let items = match cart_items(&body.items) {
        Ok(items) => items,
        Err(res) => return res,
    };
    let address = match body.address.normalized() {
        Ok(a) => a,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.delivery().check(&address.city, &address.pincode) {
        return errors::delivery_error_to_response(e);
    }
    let phone = match normalize_phone(&body.customer.phone) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let quote = match price_cart(&items, &services.read_models().products, services.delivery()) {
        Ok(q) => q,
        Err(e) => return errors::cart_error_to_response(e),
    };
    if let Some(expected) = body.expected_total {
        if Money::from_paise(expected) != quote.total {
            tracing::info!(expected, actual = quote.total.paise(), "checkout total is stale");
            return errors::json_error_with_details(
                StatusCode::CONFLICT,
                "price_mismatch",
                format!(
                    "prices have changed: the order total is now {} (you saw {})",
                    quote.total,
                    Money::from_paise(expected)
                ),
                serde_json::to_value(&quote).unwrap_or_default(),
            );
        }
    }

    let now = Utc::now();
    let (customer_id, customer_cmd) =
        customer_command(&services, &body.customer, &phone, &address, now);

    let agg = AggregateId::new();
    let order_id = OrderId::new(agg);
    let cmd = OrderCommand::PlaceOrder(PlaceOrder {
        order_id,
        order_number: order_number(&agg, now),
        customer_id,
        contact: ContactSnapshot {
            name: body.customer.name,
            phone,
            email: body.customer.email,
        },
        address,
        lines: quote.order_lines(),
        delivery_fee: quote.delivery_fee,
        payment_method: body.payment_method,
        notes: body.notes,
        idempotency_key,
        occurred_at: now,
    });

    // The customer record must not change for a checkout that is then refused.
    if let Err(e) = Order::empty(order_id).handle(&cmd) {
        return errors::domain_error_to_response(e);
    }
    if let Err(e) = dispatch_customer(&services, customer_id, customer_cmd).await {
        return errors::dispatch_error_to_response(e);
    }

    let committed = match dispatch_order(&services, order_id, cmd).await {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let Some(order) = services.read_models().orders.get(&order_id) else {
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "order was not projected",
        );
    };
    tracing::info!(
        %order_id,
        order_number = order.order_number(),
        total = order.total().paise(),
        payment_method = ?order.payment().method,
        "order placed"
    );

    (
        StatusCode::CREATED,
        Json(dto::PlaceOrderResponse {
            order: dto::OrderResponse::from(&order),
            created: true,
            events_committed: committed,
        }),
    )
        .into_response()
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, axum::response::Response> {
    let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = raw
        .to_str()
        .map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Idempotency-Key must be ASCII",
            )
        })?
        .trim();
    if key.is_empty() {
        return Ok(None);
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("Idempotency-Key is longer than {MAX_IDEMPOTENCY_KEY_LEN} characters"),
        ));
    }
    Ok(Some(key.to_string()))
}

/// Register a new customer for `phone`, or refresh the contact details of the
/// existing one.
fn customer_command(
    services: &AppServices,
    details: &dto::CustomerDetailsRequest,
    phone: &str,
    address: &DeliveryAddress,
    now: DateTime<Utc>,
) -> (CustomerId, CustomerCommand) {
    match services.read_models().customers.by_phone(phone) {
        Some(existing) => (
            existing.customer_id,
            CustomerCommand::UpdateContact(UpdateContact {
                customer_id: existing.customer_id,
                name: details.name.clone(),
                email: details.email.clone(),
                address: address.clone(),
                occurred_at: now,
            }),
        ),
        None => {
            let customer_id = CustomerId::generate();
            (
                customer_id,
                CustomerCommand::RegisterCustomer(RegisterCustomer {
                    customer_id,
                    name: details.name.clone(),
                    phone: phone.to_string(),
                    email: details.email.clone(),
                    address: address.clone(),
                    occurred_at: now,
                }),
            )
        }
    }
}

async fn dispatch_customer(
    services: &AppServices,
    customer_id: CustomerId,
    cmd: CustomerCommand,
) -> Result<(), DispatchError> {
    services
        .dispatch::<Customer>(
            customer_id.0,
            spicecart_customers::AGGREGATE_TYPE,
            cmd,
            |aggregate_id| Customer::empty(CustomerId::new(aggregate_id)),
        )
        .await?;
    Ok(())
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(order_id) = id.parse::<OrderId>() else {
        return errors::invalid_id("order");
    };
    match services.read_models().orders.get(&order_id) {
        Some(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        None => errors::not_found("order"),
    }
}

/// Lookup by order number, confirmed by the phone used at checkout. A wrong
/// phone answers exactly like an unknown order.
pub async fn track_order(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::TrackOrderQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let phone = match normalize_phone(&query.phone) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.read_models().orders.by_number(&query.order_number) {
        Some(order) if order.contact().is_some_and(|c| c.phone == phone) => {
            Json(dto::OrderResponse::from(&order)).into_response()
        }
        _ => errors::not_found("order"),
    }
}

// -------------------------
// Admin
// -------------------------

pub async fn admin_list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::OrderListQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::ORDERS_READ) {
        return res;
    }
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<OrderStatus>() {
            Ok(s) => Some(s),
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => None,
    };

    let rows: Vec<dto::OrderSummary> = services
        .read_models()
        .orders
        .list(status)
        .iter()
        .map(dto::OrderSummary::from)
        .collect();
    Json(rows).into_response()
}

pub async fn admin_get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::ORDERS_READ) {
        return res;
    }
    get_order(Extension(services), Path(id)).await
}

/// Idempotent: moving an order to the status it already has commits nothing
/// and answers 200 with `events_committed: 0`.
pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ChangeStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::ORDERS_UPDATE_STATUS) {
        return res;
    }
    let Ok(order_id) = id.parse::<OrderId>() else {
        return errors::invalid_id("order");
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };
    let status = match body.status.parse::<OrderStatus>() {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let cmd = OrderCommand::ChangeStatus(ChangeStatus {
        order_id,
        status,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let committed = match dispatch_order(&services, order_id, cmd).await {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let Some(order) = services.read_models().orders.get(&order_id) else {
        return errors::not_found("order");
    };
    if committed > 0 {
        tracing::info!(
            %order_id,
            status = %order.status(),
            principal_id = %principal.principal_id(),
            "order status changed"
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": order_id.to_string(),
            "status": order.status(),
            "payment_status": order.payment().status,
            "events_committed": committed,
        })),
    )
        .into_response()
}

/// Dispatch an order command; returns the number of events committed.
pub async fn dispatch_order(
    services: &AppServices,
    order_id: OrderId,
    cmd: OrderCommand,
) -> Result<usize, DispatchError> {
    let committed = services
        .dispatch::<Order>(order_id.0, spicecart_orders::AGGREGATE_TYPE, cmd, |aggregate_id| {
            Order::empty(OrderId::new(aggregate_id))
        })
        .await?;
    Ok(committed.len())
}
