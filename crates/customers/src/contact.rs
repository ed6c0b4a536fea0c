//! Contact value types: phone numbers, email addresses and delivery addresses.

use serde::{Deserialize, Serialize};

use spicecart_core::{DomainError, DomainResult, ValueObject};

/// Normalise an Indian mobile number to its 10-digit national form.
///
/// Accepts an optional `+91`/`91`/`0` prefix and ignores spaces, dashes, dots
/// and parentheses. Mobile numbers start with 6, 7, 8 or 9.
pub fn normalize_phone(raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    let mut digits = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(DomainError::validation("phone contains invalid characters")),
        }
    }

    let national = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('0') => &digits[1..],
        12 if digits.starts_with("91") => &digits[2..],
        _ => return Err(DomainError::validation("phone must be a 10-digit mobile number")),
    };

    match national.as_bytes().first() {
        Some(b'6'..=b'9') => Ok(national.to_string()),
        _ => Err(DomainError::validation("phone must be a 10-digit mobile number")),
    }
}

/// Trim and lowercase an optional email; empty input means "no email".
pub fn normalize_email(raw: Option<&str>) -> DomainResult<Option<String>> {
    let Some(email) = raw.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(DomainError::validation("email is not a valid address"));
    }
    Ok(Some(email.to_ascii_lowercase()))
}

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    pub city: String,
    pub pincode: String,
}

impl ValueObject for DeliveryAddress {}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl DeliveryAddress {
    /// Trimmed copy with blank optional lines dropped. Rejects a missing first
    /// line or city and anything but a 6-digit pincode.
    pub fn normalized(&self) -> DomainResult<DeliveryAddress> {
        let line1 = self.line1.trim();
        if line1.is_empty() {
            return Err(DomainError::validation("address line1 cannot be empty"));
        }
        let city = self.city.trim();
        if city.is_empty() {
            return Err(DomainError::validation("city cannot be empty"));
        }
        let pincode: String = self.pincode.chars().filter(|c| !c.is_whitespace()).collect();
        if pincode.len() != 6
            || !pincode.chars().all(|c| c.is_ascii_digit())
            || pincode.starts_with('0')
        {
            return Err(DomainError::validation("pincode must be 6 digits"));
        }

        Ok(DeliveryAddress {
            line1: line1.to_string(),
            line2: non_blank(&self.line2),
            landmark: non_blank(&self.landmark),
            city: city.to_string(),
            pincode,
        })
    }
}
