use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use spicecart_core::Money;
use spicecart_events::EventEnvelope;
use spicecart_orders::{Catalog, CatalogEntry};
use spicecart_products::{ProductEvent, ProductId, ProductStatus, AGGREGATE_TYPE};

use crate::projections::cursor::{Position, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

/// Queryable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub pack_size: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub status: ProductStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductReadModel {
    /// Listed in the storefront and orderable.
    pub fn is_sellable(&self) -> bool {
        self.status == ProductStatus::Active && self.in_stock
    }
}

/// Storefront listing filter.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case-insensitive match against name, description and category.
    pub search: Option<String>,
    /// Admin listings include drafts and archived products.
    pub include_inactive: bool,
}

/// Catalog read model with slug and SKU lookups.
#[derive(Debug)]
pub struct ProductCatalogProjection<S = InMemoryReadStore<ProductId, ProductReadModel>>
where
    S: ReadStore<ProductId, ProductReadModel>,
{
    store: S,
    by_slug: InMemoryReadStore<String, ProductId>,
    by_sku: InMemoryReadStore<String, ProductId>,
    cursors: StreamCursors,
}

impl ProductCatalogProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> ProductCatalogProjection<S>
where
    S: ReadStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_slug: InMemoryReadStore::new(),
            by_sku: InMemoryReadStore::new(),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(product_id)
    }

    pub fn by_slug(&self, slug: &str) -> Option<ProductReadModel> {
        self.by_slug.get(&slug.to_string()).and_then(|id| self.store.get(&id))
    }

    pub fn by_sku(&self, sku: &str) -> Option<ProductReadModel> {
        self.by_sku.get(&sku.to_string()).and_then(|id| self.store.get(&id))
    }

    /// Products matching `filter`, ordered by category then name.
    pub fn list(&self, filter: &ProductFilter) -> Vec<ProductReadModel> {
        let category = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let needle = filter
            .search
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let mut products: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|p| filter.include_inactive || p.status == ProductStatus::Active)
            .filter(|p| category.is_none_or(|c| p.category.eq_ignore_ascii_case(c)))
            .filter(|p| {
                needle.as_deref().is_none_or(|q| {
                    p.name.to_lowercase().contains(q)
                        || p.description.to_lowercase().contains(q)
                        || p.category.to_lowercase().contains(q)
                })
            })
            .collect();
        products.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        products
    }

    /// Distinct categories of active products, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.status == ProductStatus::Active)
            .map(|p| p.category)
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub fn clear(&self) {
        self.store.clear();
        self.by_slug.clear();
        self.by_sku.clear();
        self.cursors.clear();
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if self.cursors.position(aggregate_id, seq)? == Position::Duplicate {
            return Ok(());
        }

        let ev: ProductEvent =
            serde_json::from_value(envelope.payload().clone()).map_err(|e| {
                ProjectionError::Deserialize {
                    aggregate_type: AGGREGATE_TYPE.to_string(),
                    message: e.to_string(),
                }
            })?;

        let product_id = match &ev {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductDetailsUpdated(e) => e.product_id,
            ProductEvent::ProductPriceChanged(e) => e.product_id,
            ProductEvent::ProductStockChanged(e) => e.product_id,
            ProductEvent::ProductActivated(e) => e.product_id,
            ProductEvent::ProductArchived(e) => e.product_id,
        };
        if product_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(aggregate_id));
        }

        let at = envelope.recorded_at();
        match ev {
            ProductEvent::ProductCreated(e) => {
                self.by_slug.upsert(e.slug.clone(), e.product_id);
                self.by_sku.upsert(e.sku.clone(), e.product_id);
                self.store.upsert(
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        sku: e.sku,
                        slug: e.slug,
                        name: e.name,
                        description: e.description,
                        category: e.category,
                        pack_size: e.pack_size,
                        price: e.price,
                        image_url: e.image_url,
                        in_stock: e.in_stock,
                        status: ProductStatus::Draft,
                        version: seq,
                        created_at: at,
                        updated_at: at,
                    },
                );
            }
            other => {
                let Some(mut rm) = self.store.get(&product_id) else {
                    return Err(ProjectionError::NonMonotonicSequence {
                        aggregate_id,
                        last: 0,
                        found: seq,
                    });
                };
                match other {
                    ProductEvent::ProductDetailsUpdated(e) => {
                        rm.name = e.name;
                        rm.description = e.description;
                        rm.category = e.category;
                        rm.pack_size = e.pack_size;
                        rm.image_url = e.image_url;
                    }
                    ProductEvent::ProductPriceChanged(e) => rm.price = e.new_price,
                    ProductEvent::ProductStockChanged(e) => rm.in_stock = e.in_stock,
                    ProductEvent::ProductActivated(_) => rm.status = ProductStatus::Active,
                    ProductEvent::ProductArchived(_) => rm.status = ProductStatus::Archived,
                    ProductEvent::ProductCreated(_) => {}
                }
                rm.version = seq;
                rm.updated_at = at;
                self.store.upsert(product_id, rm);
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}

impl<S> Catalog for ProductCatalogProjection<S>
where
    S: ReadStore<ProductId, ProductReadModel>,
{
    fn entry(&self, product_id: &ProductId) -> Option<CatalogEntry> {
        self.store.get(product_id).map(|p| CatalogEntry {
            product_id: p.product_id,
            sellable: p.is_sellable(),
            sku: p.sku,
            name: p.name,
            pack_size: p.pack_size,
            unit_price: p.price,
        })
    }
}
