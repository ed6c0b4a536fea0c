//! HMAC-SHA256 signatures used by the payment gateway.
//!
//! Checkout callback: `hex(HMAC(key_secret, "<gateway_order_id>|<payment_id>"))`.
//! Webhook: `hex(HMAC(webhook_secret, raw_body))`, sent in `X-Razorpay-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signing secret is not configured")]
    MissingSecret,

    #[error("signature is not valid hex")]
    Malformed,

    #[error("signature does not match")]
    Mismatch,
}

fn mac_for(secret: &[u8], message: &[u8]) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::MissingSecret)?;
    mac.update(message);
    Ok(mac)
}

/// Lowercase hex HMAC-SHA256 of `message`.
pub fn sign_hex(secret: &[u8], message: &[u8]) -> Result<String, SignatureError> {
    let mac = mac_for(secret, message)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature.
pub fn verify_hex(secret: &[u8], message: &[u8], signature: &str) -> Result<(), SignatureError> {
    let expected = hex::decode(signature.trim()).map_err(|_| SignatureError::Malformed)?;
    let mac = mac_for(secret, message)?;
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

pub fn checkout_message(gateway_order_id: &str, payment_id: &str) -> String {
    format!("{gateway_order_id}|{payment_id}")
}

pub fn verify_checkout_signature(
    key_secret: &str,
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), SignatureError> {
    verify_hex(
        key_secret.as_bytes(),
        checkout_message(gateway_order_id, payment_id).as_bytes(),
        signature,
    )
}

pub fn verify_webhook_signature(
    webhook_secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), SignatureError> {
    verify_hex(webhook_secret.as_bytes(), body, signature)
}
