//! Order pricing: subtotal, tax, shipping and total.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::round_money;

/// Tax and shipping policy constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_fee: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            free_shipping_threshold: Decimal::new(500, 0),
            flat_shipping_fee: Decimal::new(50, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
}

impl PricingPolicy {
    /// Prices `(unit_price, quantity)` lines. The discount is clamped to
    /// `[0, subtotal]`; each derived field is rounded once.
    pub fn price<I>(&self, lines: I, discount: Decimal, waive_shipping: bool) -> PriceBreakdown
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let subtotal = round_money(lines.into_iter().map(|(price, qty)| price * Decimal::from(qty)).sum());
        let discount_amount = round_money(discount.max(Decimal::ZERO).min(subtotal));
        let taxable = subtotal - discount_amount;
        let tax_amount = round_money(taxable * self.tax_rate);
        let shipping_amount = if waive_shipping || subtotal >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            round_money(self.flat_shipping_fee)
        };
        PriceBreakdown {
            subtotal,
            discount_amount,
            tax_amount,
            shipping_amount,
            total_amount: taxable + tax_amount + shipping_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal { Decimal::from_str(s).unwrap() }

    #[test]
    fn test_no_coupon_scenario() {
        let p = PricingPolicy::default().price([(d("100"), 2)], Decimal::ZERO, false);
        assert_eq!(p.subtotal, d("200"));
        assert_eq!(p.shipping_amount, d("50"));
        assert_eq!(p.tax_amount, d("36"));
        assert_eq!(p.total_amount, d("286"));
    }

    #[test]
    fn test_fixed_coupon_scenario() {
        let p = PricingPolicy::default().price([(d("100"), 2)], d("10"), false);
        assert_eq!(p.discount_amount, d("10"));
        assert_eq!(p.tax_amount, d("34.2"));
        assert_eq!(p.shipping_amount, d("50"));
        assert_eq!(p.total_amount, d("274.2"));
    }

    #[test]
    fn test_free_shipping_threshold_uses_undiscounted_subtotal() {
        let p = PricingPolicy::default().price([(d("250"), 2)], d("100"), false);
        assert_eq!(p.shipping_amount, Decimal::ZERO);
        assert_eq!(p.total_amount, d("400") + d("72"));
    }

    #[test]
    fn test_waived_shipping() {
        let p = PricingPolicy::default().price([(d("10"), 1)], Decimal::ZERO, true);
        assert_eq!(p.shipping_amount, Decimal::ZERO);
        assert_eq!(p.total_amount, d("11.8"));
    }

    #[test]
    fn test_discount_larger_than_subtotal_is_clamped() {
        let p = PricingPolicy::default().price([(d("30"), 1)], d("45"), false);
        assert_eq!(p.discount_amount, d("30"));
        assert_eq!(p.tax_amount, Decimal::ZERO);
        assert_eq!(p.total_amount, d("50"));
    }

    #[test]
    fn test_tax_rounding_half_up() {
        // 0.18 * 12.25 = 2.205 -> 2.21
        let p = PricingPolicy::default().price([(d("12.25"), 1)], Decimal::ZERO, false);
        assert_eq!(p.tax_amount, d("2.21"));
        assert_eq!(p.total_amount, p.subtotal - p.discount_amount + p.tax_amount + p.shipping_amount);
    }
}
