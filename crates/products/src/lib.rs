//! Product catalog domain (event-sourced).
//!
//! Business rules for the spice catalog: SKU and slug normalisation, price
//! changes, stock availability and the draft/active/archived lifecycle. Pure
//! logic only; storage and HTTP live elsewhere.

pub mod product;

pub use product::{
    normalize_sku, slugify, ActivateProduct, ArchiveProduct, ChangePrice, CreateProduct,
    Product, ProductActivated, ProductArchived, ProductCommand, ProductCreated,
    ProductDetailsUpdated, ProductEvent, ProductId, ProductPriceChanged, ProductStatus,
    ProductStockChanged, SetStockAvailability, UpdateProductDetails,
};

/// Aggregate type name recorded in the event store for product streams.
pub const AGGREGATE_TYPE: &str = "products.product";
