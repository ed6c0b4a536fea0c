//! Projections (read model builders).
//!
//! Projections consume committed envelopes and build query-optimised views. They
//! are rebuildable from the event store and idempotent under at-least-once
//! delivery.

pub mod cursor;
pub mod customers;
pub mod orders;
pub mod products;
pub mod read_models;

pub use cursor::ProjectionError;
pub use customers::{CustomerDirectoryProjection, CustomerReadModel};
pub use orders::OrdersProjection;
pub use products::{ProductCatalogProjection, ProductFilter, ProductReadModel};
pub use read_models::{ReadModels, RebuildError};
