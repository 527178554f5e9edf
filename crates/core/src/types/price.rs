//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use std::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error returned when a price amount is negative.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("price cannot be negative: {0}")]
pub struct NegativePrice(pub Decimal);

/// A non-negative price in the store currency's standard unit.
///
/// Listings on the marketplace share a single currency, so no currency code
/// is carried. Deserialization rejects negative amounts.
///
/// ```
/// use campus_market_core::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::new(1250, 2)).unwrap();
/// assert_eq!(price.line_total(3).amount(), Decimal::new(3750, 2));
/// assert_eq!(price.to_string(), "12.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns [`NegativePrice`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, NegativePrice> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(NegativePrice(amount));
        }
        Ok(Self(amount))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price multiplied by a quantity.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = NegativePrice;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|p| p.0).sum())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert!(Price::new(Decimal::new(-1, 2)).is_err());
        assert!(Price::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_sum() {
        let total: Price = [Decimal::new(150, 2), Decimal::new(275, 2)]
            .into_iter()
            .map(|d| Price::new(d).unwrap())
            .sum();
        assert_eq!(total.amount(), Decimal::new(425, 2));
    }

    #[test]
    fn test_deserialize_number_and_string() {
        let from_number: Price = serde_json::from_str("19.5").unwrap();
        let from_string: Price = serde_json::from_str("\"19.5\"").unwrap();
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_str::<Price>("-5").is_err());
    }
}
