//! HTTP API: storefront and admin routes, request/response mapping and the
//! server binary's wiring.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
