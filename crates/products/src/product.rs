use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spicecart_core::{Aggregate, AggregateRoot, DomainError, Money};
use spicecart_events::Event;

spicecart_core::typed_id!(
    /// Product identifier.
    ProductId
);

const MAX_NAME_LEN: usize = 120;
const MAX_SKU_LEN: usize = 32;
const MAX_DESCRIPTION_LEN: usize = 4000;

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

/// Trim and upper-case a SKU, rejecting anything outside `[A-Z0-9-]`.
pub fn normalize_sku(raw: &str) -> Result<String, DomainError> {
    let sku = raw.trim().to_ascii_uppercase();
    if sku.is_empty() {
        return Err(DomainError::validation("sku cannot be empty"));
    }
    if sku.len() > MAX_SKU_LEN {
        return Err(DomainError::validation(format!(
            "sku must be at most {MAX_SKU_LEN} characters"
        )));
    }
    if !sku.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(DomainError::validation(
            "sku may only contain letters, digits and '-'",
        ));
    }
    Ok(sku)
}

/// URL slug: lowercase ASCII alphanumeric runs joined by single dashes.
///
/// `"Kashmiri Chilli Powder (200 g)"` becomes `"kashmiri-chilli-powder-200-g"`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn validate_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_category(category: &str) -> Result<String, DomainError> {
    let category = category.trim();
    if category.is_empty() {
        return Err(DomainError::validation("category cannot be empty"));
    }
    Ok(category.to_string())
}

fn validate_description(description: &str) -> Result<String, DomainError> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(DomainError::validation("description is too long"));
    }
    Ok(description.to_string())
}

fn validate_price(price: Money) -> Result<(), DomainError> {
    if price.is_zero() {
        return Err(DomainError::validation("price must be greater than zero"));
    }
    Ok(())
}

/// Empty input clears the image.
fn validate_image_url(url: &str) -> Result<Option<String>, DomainError> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
        Ok(Some(url.to_string()))
    } else {
        Err(DomainError::validation(
            "image_url must be an absolute http(s) URL or a site-relative path",
        ))
    }
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: String,
    slug: String,
    name: String,
    description: String,
    category: String,
    pack_size: String,
    price: Money,
    image_url: Option<String>,
    in_stock: bool,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            sku: String::new(),
            slug: String::new(),
            name: String::new(),
            description: String::new(),
            category: String::new(),
            pack_size: String::new(),
            price: Money::ZERO,
            image_url: None,
            in_stock: false,
            status: ProductStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn pack_size(&self) -> &str {
        &self.pack_size
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn in_stock(&self) -> bool {
        self.in_stock
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    /// Active and in stock.
    pub fn is_sellable(&self) -> bool {
        self.created && self.status == ProductStatus::Active && self.in_stock
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub sku: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    pub name: String,
    pub description: String,
    pub category: String,
    pub pack_size: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub in_stock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProductDetails. `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductDetails {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub pack_size: Option<String>,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePrice {
    pub product_id: ProductId,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStockAvailability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStockAvailability {
    pub product_id: ProductId,
    pub in_stock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProductDetails(UpdateProductDetails),
    ChangePrice(ChangePrice),
    SetStockAvailability(SetStockAvailability),
    ActivateProduct(ActivateProduct),
    ArchiveProduct(ArchiveProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
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
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDetailsUpdated. Carries the full set of descriptive fields after
/// the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetailsUpdated {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub pack_size: String,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductPriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPriceChanged {
    pub product_id: ProductId,
    pub old_price: Money,
    pub new_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductStockChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStockChanged {
    pub product_id: ProductId,
    pub in_stock: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductDetailsUpdated(ProductDetailsUpdated),
    ProductPriceChanged(ProductPriceChanged),
    ProductStockChanged(ProductStockChanged),
    ProductActivated(ProductActivated),
    ProductArchived(ProductArchived),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductDetailsUpdated(_) => "products.product.details_updated",
            ProductEvent::ProductPriceChanged(_) => "products.product.price_changed",
            ProductEvent::ProductStockChanged(_) => "products.product.stock_changed",
            ProductEvent::ProductActivated(_) => "products.product.activated",
            ProductEvent::ProductArchived(_) => "products.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductDetailsUpdated(e) => e.occurred_at,
            ProductEvent::ProductPriceChanged(e) => e.occurred_at,
            ProductEvent::ProductStockChanged(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.sku = e.sku.clone();
                self.slug = e.slug.clone();
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.category = e.category.clone();
                self.pack_size = e.pack_size.clone();
                self.price = e.price;
                self.image_url = e.image_url.clone();
                self.in_stock = e.in_stock;
                self.status = ProductStatus::Draft;
                self.created = true;
            }
            ProductEvent::ProductDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.category = e.category.clone();
                self.pack_size = e.pack_size.clone();
                self.image_url = e.image_url.clone();
            }
            ProductEvent::ProductPriceChanged(e) => {
                self.price = e.new_price;
            }
            ProductEvent::ProductStockChanged(e) => {
                self.in_stock = e.in_stock;
            }
            ProductEvent::ProductActivated(_) => {
                self.status = ProductStatus::Active;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProductDetails(cmd) => self.handle_update_details(cmd),
            ProductCommand::ChangePrice(cmd) => self.handle_change_price(cmd),
            ProductCommand::SetStockAvailability(cmd) => self.handle_set_stock(cmd),
            ProductCommand::ActivateProduct(cmd) => self.handle_activate(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Product {
    fn ensure_exists(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("product"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), DomainError> {
        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("archived products cannot be modified"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        let name = validate_name(&cmd.name)?;
        let sku = normalize_sku(&cmd.sku)?;
        let category = validate_category(&cmd.category)?;
        let description = validate_description(&cmd.description)?;
        validate_price(cmd.price)?;

        let slug = match &cmd.slug {
            Some(explicit) => {
                let slug = slugify(explicit);
                if slug != explicit.trim() {
                    return Err(DomainError::validation(
                        "slug may only contain lowercase letters, digits and single dashes",
                    ));
                }
                slug
            }
            None => slugify(&name),
        };
        if slug.is_empty() {
            return Err(DomainError::validation("slug cannot be empty"));
        }

        let image_url = match &cmd.image_url {
            Some(url) => validate_image_url(url)?,
            None => None,
        };

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            sku,
            slug,
            name,
            description,
            category,
            pack_size: cmd.pack_size.trim().to_string(),
            price: cmd.price,
            image_url,
            in_stock: cmd.in_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(
        &self,
        cmd: &UpdateProductDetails,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_editable()?;

        let name = match &cmd.name {
            Some(n) => validate_name(n)?,
            None => self.name.clone(),
        };
        let description = match &cmd.description {
            Some(d) => validate_description(d)?,
            None => self.description.clone(),
        };
        let category = match &cmd.category {
            Some(c) => validate_category(c)?,
            None => self.category.clone(),
        };
        let pack_size = match &cmd.pack_size {
            Some(p) => p.trim().to_string(),
            None => self.pack_size.clone(),
        };
        let image_url = match &cmd.image_url {
            Some(url) => validate_image_url(url)?,
            None => self.image_url.clone(),
        };

        if name == self.name
            && description == self.description
            && category == self.category
            && pack_size == self.pack_size
            && image_url == self.image_url
        {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductDetailsUpdated(ProductDetailsUpdated {
            product_id: cmd.product_id,
            name,
            description,
            category,
            pack_size,
            image_url,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(&self, cmd: &ChangePrice) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_editable()?;
        validate_price(cmd.price)?;

        if cmd.price == self.price {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductPriceChanged(ProductPriceChanged {
            product_id: cmd.product_id,
            old_price: self.price,
            new_price: cmd.price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_stock(
        &self,
        cmd: &SetStockAvailability,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if cmd.in_stock == self.in_stock {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductStockChanged(ProductStockChanged {
            product_id: cmd.product_id,
            in_stock: cmd.in_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        match self.status {
            ProductStatus::Active => Ok(vec![]),
            ProductStatus::Archived => Err(DomainError::invariant(
                "archived products cannot be activated",
            )),
            ProductStatus::Draft => Ok(vec![ProductEvent::ProductActivated(ProductActivated {
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
