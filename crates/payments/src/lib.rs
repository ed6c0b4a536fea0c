//! Payment gateway integration.
//!
//! - `signature`: HMAC-SHA256 checks for checkout callbacks and webhooks
//! - `gateway`: the `PaymentGateway` seam plus the Razorpay and offline clients
//! - `webhook`: parsing of gateway webhook bodies

pub mod gateway;
pub mod offline;
pub mod razorpay;
pub mod signature;
pub mod webhook;

pub use gateway::{CreateGatewayOrder, GatewayError, GatewayOrder, PaymentGateway};
pub use offline::OfflineGateway;
pub use razorpay::{RazorpayConfig, RazorpayGateway};
pub use signature::{
    sign_hex, verify_checkout_signature, verify_webhook_signature, SignatureError,
};
pub use webhook::{parse_webhook, WebhookError, WebhookEvent};
