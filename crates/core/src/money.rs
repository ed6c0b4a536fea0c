//! Value objects: things compared by value rather than identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker for immutable values compared by their attributes.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// An INR amount in paise (1/100 rupee).
///
/// Integer arithmetic only. Every operation that could overflow is checked and
/// reported as a validation failure.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);
    pub const CURRENCY: &'static str = "INR";

    pub const fn from_paise(paise: u64) -> Self {
        Self(paise)
    }

    pub const fn paise(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub fn checked_mul(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// `self - other`, clamped at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    pub fn sum<I>(amounts: I) -> DomainResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "₹{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_formats_rupees_and_paise() {
        assert_eq!(Money::from_paise(12345).to_string(), "₹123.45");
        assert_eq!(Money::from_paise(5).to_string(), "₹0.05");
        assert_eq!(Money::ZERO.to_string(), "₹0.00");
    }

    #[test]
    fn overflow_is_a_validation_error() {
        let big = Money::from_paise(u64::MAX);
        assert!(matches!(
            big.checked_add(Money::from_paise(1)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(big.checked_mul(2), Err(DomainError::Validation(_))));
    }

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&Money::from_paise(49900)).unwrap();
        assert_eq!(json, "49900");
    }

    proptest! {
        #[test]
        fn sum_matches_integer_sum(values in prop::collection::vec(0u64..1_000_000, 0..50)) {
            let expected: u64 = values.iter().sum();
            let total = Money::sum(values.iter().copied().map(Money::from_paise)).unwrap();
            prop_assert_eq!(total.paise(), expected);
        }

        #[test]
        fn saturating_sub_never_underflows(a in any::<u64>(), b in any::<u64>()) {
            let r = Money::from_paise(a).saturating_sub(Money::from_paise(b));
            prop_assert_eq!(r.paise(), a.saturating_sub(b));
        }
    }
}
