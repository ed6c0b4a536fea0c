use axum::{routing::get, Router};

pub mod admin;
pub mod cart;
pub mod customers;
pub mod orders;
pub mod payments;
pub mod products;
pub mod system;

/// Storefront endpoints, mounted under `/api`.
pub fn public_router() -> Router {
    Router::new()
        .nest("/products", products::public_router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::public_router())
        .nest("/payments", payments::router())
}

/// Authenticated back-office endpoints, mounted under `/api/admin`.
pub fn admin_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::admin_router())
        .nest("/orders", orders::admin_router())
        .nest("/customers", customers::router())
        .merge(admin::router())
}
