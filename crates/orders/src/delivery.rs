//! Single-city delivery policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spicecart_core::Money;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("we currently deliver only within {served}; '{requested}' is not served")]
    CityNotServed { requested: String, served: String },

    #[error("pincode must be 6 digits")]
    InvalidPincode,

    #[error("pincode {0} is outside the delivery area")]
    PincodeNotServed(String),
}

/// Where and at what cost orders are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    pub city: String,
    /// Serviceable pincode prefixes. Empty means every pincode in the city.
    #[serde(default)]
    pub pincode_prefixes: Vec<String>,
    pub delivery_fee: Money,
    /// Subtotal at which delivery becomes free. Zero disables the waiver.
    pub free_delivery_threshold: Money,
    /// Smallest accepted subtotal. Zero disables the check.
    pub minimum_order: Money,
}

fn canonical_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl DeliveryPolicy {
    pub fn serves_city(&self, city: &str) -> bool {
        canonical_city(city) == canonical_city(&self.city)
    }

    /// Check that an address can be delivered to.
    pub fn check(&self, city: &str, pincode: &str) -> Result<(), DeliveryError> {
        if !self.serves_city(city) {
            return Err(DeliveryError::CityNotServed {
                requested: city.trim().to_string(),
                served: self.city.clone(),
            });
        }

        let pincode: String = pincode.chars().filter(|c| !c.is_whitespace()).collect();
        if pincode.len() != 6 || !pincode.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeliveryError::InvalidPincode);
        }

        if !self.pincode_prefixes.is_empty()
            && !self
                .pincode_prefixes
                .iter()
                .any(|prefix| pincode.starts_with(prefix.as_str()))
        {
            return Err(DeliveryError::PincodeNotServed(pincode));
        }

        Ok(())
    }

    /// Delivery fee for a given subtotal.
    pub fn fee_for(&self, subtotal: Money) -> Money {
        if !self.free_delivery_threshold.is_zero() && subtotal >= self.free_delivery_threshold {
            Money::ZERO
        } else {
            self.delivery_fee
        }
    }

    /// How much more the customer must add for free delivery.
    pub fn free_delivery_remaining(&self, subtotal: Money) -> Money {
        if self.free_delivery_threshold.is_zero() {
            return Money::ZERO;
        }
        self.free_delivery_threshold.saturating_sub(subtotal)
    }
}
