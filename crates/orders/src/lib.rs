//! Orders domain module (event-sourced).
//!
//! Cart pricing against server-side catalog prices, the single-city delivery
//! policy, and the order aggregate with its payment and fulfilment state
//! machine. Deterministic logic only.

pub mod cart;
pub mod delivery;
pub mod number;
pub mod order;

pub use cart::{price_cart, CartError, CartItem, CartQuote, Catalog, CatalogEntry, QuotedLine};
pub use delivery::{DeliveryError, DeliveryPolicy};
pub use number::order_number;
pub use order::{
    AttachGatewayOrder, CapturePayment, ChangeStatus, ContactSnapshot, FailPayment,
    GatewayOrderAttached, Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderPlaced,
    OrderStatus, OrderStatusChanged, Payment, PaymentCaptured, PaymentFailed, PaymentMethod,
    PaymentStatus, PlaceOrder, StatusChange,
};

/// Aggregate type name recorded in the event store for order streams.
pub const AGGREGATE_TYPE: &str = "orders.order";

/// Upper bound on the quantity of a single line.
pub const MAX_LINE_QUANTITY: u32 = 50;

/// Upper bound on distinct products in one cart or order.
pub const MAX_LINES: usize = 50;
