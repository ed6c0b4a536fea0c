//! Server-side cart pricing.
//!
//! Clients send product ids and quantities only. Every price, name and the
//! delivery fee come from the catalog and the delivery policy, so a quote can be
//! trusted as the basis of an order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spicecart_core::{DomainError, Money};
use spicecart_products::ProductId;

use crate::delivery::DeliveryPolicy;
use crate::order::OrderLine;
use crate::{MAX_LINES, MAX_LINE_QUANTITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// What the cart needs to know about a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub pack_size: String,
    pub unit_price: Money,
    pub sellable: bool,
}

/// Read access to current catalog prices.
pub trait Catalog {
    fn entry(&self, product_id: &ProductId) -> Option<CatalogEntry>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,

    #[error("cart has more than {} distinct products", MAX_LINES)]
    TooManyLines,

    #[error(
        "quantity for product {product_id} must be between 1 and {} (got {quantity})",
        MAX_LINE_QUANTITY
    )]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    #[error("'{name}' is currently unavailable")]
    Unavailable { product_id: ProductId, name: String },

    #[error("minimum order value is {minimum}; cart subtotal is {subtotal}")]
    BelowMinimum { minimum: Money, subtotal: Money },

    #[error(transparent)]
    Amount(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub pack_size: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// A fully priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartQuote {
    pub lines: Vec<QuotedLine>,
    pub item_count: u32,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub free_delivery_remaining: Money,
    pub currency: String,
}

impl CartQuote {
    /// Numbered order lines, in cart order.
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .zip(1u32..)
            .map(|(line, line_no)| OrderLine {
                line_no,
                product_id: line.product_id,
                sku: line.sku.clone(),
                name: line.name.clone(),
                pack_size: line.pack_size.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total,
            })
            .collect()
    }
}

/// Merge repeated products, keeping first-seen order.
fn merge_items(items: &[CartItem]) -> Result<Vec<CartItem>, CartError> {
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity {
                product_id: item.product_id,
                quantity: 0,
            });
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => merged.push(*item),
        }
    }

    if merged.is_empty() {
        return Err(CartError::Empty);
    }
    if merged.len() > MAX_LINES {
        return Err(CartError::TooManyLines);
    }
    if let Some(item) = merged.iter().find(|m| m.quantity > MAX_LINE_QUANTITY) {
        return Err(CartError::InvalidQuantity {
            product_id: item.product_id,
            quantity: item.quantity,
        });
    }
    Ok(merged)
}

/// Price a cart against the catalog and delivery policy.
pub fn price_cart<C>(
    items: &[CartItem],
    catalog: &C,
    policy: &DeliveryPolicy,
) -> Result<CartQuote, CartError>
where
    C: Catalog + ?Sized,
{
    let merged = merge_items(items)?;

    let mut lines = Vec::with_capacity(merged.len());
    for item in &merged {
        let entry = catalog
            .entry(&item.product_id)
            .ok_or(CartError::UnknownProduct(item.product_id))?;
        if !entry.sellable {
            return Err(CartError::Unavailable {
                product_id: item.product_id,
                name: entry.name,
            });
        }
        let line_total = entry.unit_price.checked_mul(item.quantity)?;
        lines.push(QuotedLine {
            product_id: item.product_id,
            sku: entry.sku,
            name: entry.name,
            pack_size: entry.pack_size,
            unit_price: entry.unit_price,
            quantity: item.quantity,
            line_total,
        });
    }

    let subtotal = Money::sum(lines.iter().map(|l| l.line_total))?;
    if !policy.minimum_order.is_zero() && subtotal < policy.minimum_order {
        return Err(CartError::BelowMinimum {
            minimum: policy.minimum_order,
            subtotal,
        });
    }

    let delivery_fee = policy.fee_for(subtotal);
    let total = subtotal.checked_add(delivery_fee)?;

    Ok(CartQuote {
        item_count: lines.iter().map(|l| l.quantity).sum(),
        free_delivery_remaining: policy.free_delivery_remaining(subtotal),
        lines,
        subtotal,
        delivery_fee,
        total,
        currency: Money::CURRENCY.to_string(),
    })
}
