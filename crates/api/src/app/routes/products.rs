use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use spicecart_auth::Permission;
use spicecart_core::{AggregateId, Money};
use spicecart_infra::projections::{ProductFilter, ProductReadModel};
use spicecart_products::{
    normalize_sku, slugify, ActivateProduct, ArchiveProduct, ChangePrice, CreateProduct, Product,
    ProductCommand, ProductId, ProductStatus, SetStockAvailability, UpdateProductDetails,
    AGGREGATE_TYPE,
};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/categories", get(list_categories))
        .route("/:id_or_slug", get(get_product))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/", post(create_product).get(admin_list_products))
        .route("/:id", put(update_product))
        .route("/:id/price", put(change_price))
        .route("/:id/stock", put(set_stock))
        .route("/:id/activate", post(activate_product))
        .route("/:id/archive", post(archive_product))
}

// -------------------------
// Storefront
// -------------------------

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ProductListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let filter = ProductFilter {
        category: query.category,
        search: query.q,
        include_inactive: false,
    };
    Json(services.read_models().products.list(&filter)).into_response()
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> impl IntoResponse {
    Json(services.read_models().products.categories())
}

/// Active product by id or slug. Drafts and archived products are hidden.
pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id_or_slug): Path<String>,
) -> axum::response::Response {
    let catalog = &services.read_models().products;
    let found = match id_or_slug.parse::<ProductId>() {
        Ok(id) => catalog.get(&id),
        Err(_) => catalog.by_slug(id_or_slug.trim()),
    };

    match found {
        Some(p) if p.status == ProductStatus::Active => Json(p).into_response(),
        _ => errors::not_found("product"),
    }
}

// -------------------------
// Admin
// -------------------------

pub async fn admin_list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ProductListQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::PRODUCTS_READ) {
        return res;
    }
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };
    let filter = ProductFilter {
        category: query.category,
        search: query.q,
        include_inactive: true,
    };
    Json(services.read_models().products.list(&filter)).into_response()
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::PRODUCTS_CREATE) {
        return res;
    }
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    if let Some(res) = duplicate_check(&services, &body) {
        return res;
    }

    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::CreateProduct(CreateProduct {
        product_id,
        sku: body.sku,
        slug: body.slug,
        name: body.name,
        description: body.description,
        category: body.category,
        pack_size: body.pack_size,
        price: Money::from_paise(body.price),
        image_url: body.image_url,
        in_stock: body.in_stock,
        occurred_at: Utc::now(),
    });

    let committed = match services
        .dispatch::<Product>(agg, AGGREGATE_TYPE, cmd, |aggregate_id| {
            Product::empty(ProductId::new(aggregate_id))
        })
        .await
    {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    tracing::info!(%product_id, principal_id = %principal.principal_id(), "product created");

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

/// SKU and slug uniqueness against the catalog read model.
fn duplicate_check(
    services: &AppServices,
    body: &dto::CreateProductRequest,
) -> Option<axum::response::Response> {
    let catalog = &services.read_models().products;

    // Malformed SKUs are left for the aggregate to reject.
    if let Ok(sku) = normalize_sku(&body.sku) {
        if catalog.by_sku(&sku).is_some() {
            return Some(errors::json_error(
                StatusCode::CONFLICT,
                "duplicate",
                format!("a product with sku '{sku}' already exists"),
            ));
        }
    }

    let slug = match body.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) => explicit.to_string(),
        None => slugify(&body.name),
    };
    if !slug.is_empty() && catalog.by_slug(&slug).is_some() {
        return Some(errors::json_error(
            StatusCode::CONFLICT,
            "duplicate",
            format!("a product with slug '{slug}' already exists"),
        ));
    }
    None
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::PRODUCTS_UPDATE) {
        return res;
    }
    let Ok(product_id) = id.parse::<ProductId>() else {
        return errors::invalid_id("product");
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    let cmd = ProductCommand::UpdateProductDetails(UpdateProductDetails {
        product_id,
        name: body.name,
        description: body.description,
        category: body.category,
        pack_size: body.pack_size,
        image_url: body.image_url,
        occurred_at: Utc::now(),
    });
    run(&services, product_id, cmd).await
}

pub async fn change_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ChangePriceRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::PRODUCTS_UPDATE) {
        return res;
    }
    let Ok(product_id) = id.parse::<ProductId>() else {
        return errors::invalid_id("product");
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    let cmd = ProductCommand::ChangePrice(ChangePrice {
        product_id,
        price: Money::from_paise(body.price),
        occurred_at: Utc::now(),
    });
    run(&services, product_id, cmd).await
}

pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::SetStockRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::PRODUCTS_UPDATE) {
        return res;
    }
    let Ok(product_id) = id.parse::<ProductId>() else {
        return errors::invalid_id("product");
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    let cmd = ProductCommand::SetStockAvailability(SetStockAvailability {
        product_id,
        in_stock: body.in_stock,
        occurred_at: Utc::now(),
    });
    run(&services, product_id, cmd).await
}

pub async fn activate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::PRODUCTS_PUBLISH) {
        return res;
    }
    let Ok(product_id) = id.parse::<ProductId>() else {
        return errors::invalid_id("product");
    };

    let cmd = ProductCommand::ActivateProduct(ActivateProduct {
        product_id,
        occurred_at: Utc::now(),
    });
    run(&services, product_id, cmd).await
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::PRODUCTS_PUBLISH) {
        return res;
    }
    let Ok(product_id) = id.parse::<ProductId>() else {
        return errors::invalid_id("product");
    };

    let cmd = ProductCommand::ArchiveProduct(ArchiveProduct {
        product_id,
        occurred_at: Utc::now(),
    });
    run(&services, product_id, cmd).await
}

/// Dispatch against an existing product and answer with its current state.
async fn run(
    services: &AppServices,
    product_id: ProductId,
    cmd: ProductCommand,
) -> axum::response::Response {
    let committed = match services
        .dispatch::<Product>(product_id.0, AGGREGATE_TYPE, cmd, |aggregate_id| {
            Product::empty(ProductId::new(aggregate_id))
        })
        .await
    {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let product: Option<ProductReadModel> = services.read_models().products.get(&product_id);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": product_id.to_string(),
            "events_committed": committed.len(),
            "product": product,
        })),
    )
        .into_response()
}
