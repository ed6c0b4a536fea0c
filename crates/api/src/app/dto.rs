use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spicecart_core::{AggregateRoot, Money};
use spicecart_customers::{CustomerId, DeliveryAddress};
use spicecart_infra::projections::CustomerReadModel;
use spicecart_orders::{
    CartQuote, ContactSnapshot, Order, OrderId, OrderLine, OrderStatus, Payment, PaymentMethod,
    StatusChange,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub slug: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub pack_size: String,
    /// Paise.
    pub price: u64,
    pub image_url: Option<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub pack_size: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePriceRequest {
    pub price: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub in_stock: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CartQuoteRequest {
    pub items: Vec<CartItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryCheckRequest {
    pub city: String,
    pub pincode: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomerDetailsRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer: CustomerDetailsRequest,
    pub address: DeliveryAddress,
    pub items: Vec<CartItemRequest>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    /// Total the client displayed, in paise. A mismatch against the server
    /// quote rejects the order.
    pub expected_total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TrackOrderQuery {
    pub order_number: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
}

/// Fields posted back by the gateway's browser checkout.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: Option<String>,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_id: Option<CustomerId>,
    pub contact: Option<ContactSnapshot>,
    pub address: Option<DeliveryAddress>,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub currency: &'static str,
    pub notes: Option<String>,
    pub payment: Payment,
    pub history: Vec<StatusChange>,
    pub placed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id_typed(),
            order_number: order.order_number().to_string(),
            status: order.status(),
            customer_id: order.customer_id(),
            contact: order.contact().cloned(),
            address: order.address().cloned(),
            lines: order.lines().to_vec(),
            subtotal: order.subtotal(),
            delivery_fee: order.delivery_fee(),
            total: order.total(),
            currency: Money::CURRENCY,
            notes: order.notes().map(str::to_string),
            payment: order.payment().clone(),
            history: order.history().to_vec(),
            placed_at: order.placed_at(),
            version: order.version(),
        }
    }
}

/// Order list row for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub total: Money,
    pub payment: Payment,
    pub placed_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id_typed(),
            order_number: order.order_number().to_string(),
            status: order.status(),
            customer_name: order.contact().map(|c| c.name.clone()),
            phone: order.contact().map(|c| c.phone.clone()),
            total: order.total(),
            payment: order.payment().clone(),
            placed_at: order.placed_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerDetailResponse {
    #[serde(flatten)]
    pub customer: CustomerReadModel,
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: CartQuote,
    pub delivery_city: String,
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order: OrderResponse,
    /// False when an `Idempotency-Key` matched an earlier order.
    pub created: bool,
    pub events_committed: usize,
}

#[derive(Debug, Serialize)]
pub struct PaymentOrderResponse {
    pub order_id: OrderId,
    pub order_number: String,
    pub gateway: &'static str,
    pub key_id: String,
    pub gateway_order_id: String,
    pub amount: Money,
    pub currency: &'static str,
    pub events_committed: usize,
}
