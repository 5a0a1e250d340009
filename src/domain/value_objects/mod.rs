//! Value Objects for order placement

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rounds a monetary amount to 2 decimal places, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Externally visible order number: `ORD-<unix millis>-<3 digit random>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: u16 = rand::thread_rng().gen_range(0..1000);
        Self::from_parts(now.timestamp_millis(), suffix)
    }

    pub fn from_parts(millis: i64, suffix: u16) -> Self {
        Self(format!("ORD-{}-{:03}", millis, suffix % 1000))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, OrderNumberError> {
        let value = value.into().trim().to_uppercase();
        let rest = value.strip_prefix("ORD-").ok_or(OrderNumberError::Malformed)?;
        let (millis, suffix) = rest.split_once('-').ok_or(OrderNumberError::Malformed)?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(millis) || !digits(suffix) || suffix.len() != 3 {
            return Err(OrderNumberError::Malformed);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderNumberError {
    #[error("order number must look like ORD-<timestamp>-<NNN>")]
    Malformed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(Decimal::from_str("34.205").unwrap()), Decimal::from_str("34.21").unwrap());
        assert_eq!(round_money(Decimal::from_str("34.204").unwrap()), Decimal::from_str("34.20").unwrap());
        assert_eq!(round_money(Decimal::from_str("0.005").unwrap()), Decimal::from_str("0.01").unwrap());
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let number = OrderNumber::generate(now);
        let prefix = format!("ORD-{}-", now.timestamp_millis());
        assert!(number.as_str().starts_with(&prefix));
        assert_eq!(number.as_str().len(), prefix.len() + 3);
        assert_eq!(OrderNumber::from_parts(1700000000000, 7).as_str(), "ORD-1700000000000-007");
    }

    #[test]
    fn test_order_number_parse() {
        assert_eq!(OrderNumber::parse(" ord-1700000000000-042 ").unwrap().as_str(), "ORD-1700000000000-042");
        assert!(OrderNumber::parse("ORD-17-42").is_err());
        assert!(OrderNumber::parse("INV-1700000000000-042").is_err());
        assert!(OrderNumber::parse("ORD-abc-042").is_err());
    }
}
