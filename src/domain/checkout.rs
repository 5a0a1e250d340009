//! Turns a validated cart into an order draft ready to persist.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::{AddressSnapshot, AppliedCoupon, CheckoutCart};
use crate::domain::pricing::{PriceBreakdown, PricingPolicy};
use crate::domain::stock::{self, StockShortage};
use crate::domain::value_objects::{round_money, OrderNumber};

pub const DEFAULT_SHIPPING_METHOD: &str = "standard";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error(transparent)]
    InsufficientStock(#[from] StockShortage),
}

/// An address the user owns, with the fields frozen for the order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub id: i64,
    pub snapshot: AddressSnapshot,
}

#[derive(Clone, Debug, Default)]
pub struct CheckoutOptions {
    pub shipping_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderItemDraft {
    pub product_id: i64,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub product_image_url: Option<String>,
    pub variant_attributes: Option<serde_json::Value>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDraft {
    pub order_number: OrderNumber,
    pub user_id: i64,
    pub currency: String,
    pub pricing: PriceBreakdown,
    pub coupon: Option<AppliedCoupon>,
    pub shipping_address_id: i64,
    pub billing_address_id: i64,
    pub shipping_address: AddressSnapshot,
    pub billing_address: AddressSnapshot,
    pub shipping_method: String,
    pub customer_notes: Option<String>,
    pub estimated_delivery_date: NaiveDate,
    pub items: Vec<OrderItemDraft>,
}

/// Checkout preconditions: at least one line, every line covered by stock.
pub fn ensure_ready(cart: &CheckoutCart) -> Result<(), BuildError> {
    if cart.is_empty() { return Err(BuildError::EmptyCart); }
    stock::check_availability(cart.lines())?;
    Ok(())
}

/// Adds `business_days` to `placed`, skipping Saturdays and Sundays.
pub fn estimate_delivery_date(placed: NaiveDate, business_days: u32) -> NaiveDate {
    let mut date = placed;
    let mut added = 0;
    while added < business_days {
        date += Duration::days(1);
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) { added += 1; }
    }
    date
}

pub struct OrderBuilder<'a> {
    pub policy: &'a PricingPolicy,
    pub currency: &'a str,
    pub delivery_business_days: u32,
    pub free_shipping_coupons_waive_shipping: bool,
}

impl OrderBuilder<'_> {
    pub fn build(
        &self,
        cart: &CheckoutCart,
        coupon: Option<AppliedCoupon>,
        shipping: ResolvedAddress,
        billing: ResolvedAddress,
        options: CheckoutOptions,
        now: DateTime<Utc>,
    ) -> Result<OrderDraft, BuildError> {
        ensure_ready(cart)?;

        let discount = coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount);
        let waive_shipping = self.free_shipping_coupons_waive_shipping && coupon.as_ref().is_some_and(|c| c.waives_shipping);
        let pricing = self.policy.price(cart.lines().iter().map(|l| (l.unit_price, l.quantity)), discount, waive_shipping);
        // Usage is recorded at the amount the order actually received.
        let coupon = coupon.map(|c| AppliedCoupon { discount: pricing.discount_amount, ..c });

        let items = cart
            .lines()
            .iter()
            .map(|line| OrderItemDraft {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                product_sku: line.sku.clone(),
                product_image_url: line.image_url.clone(),
                variant_attributes: line.variant_attributes(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                total_price: round_money(line.line_total()),
            })
            .collect();

        Ok(OrderDraft {
            order_number: OrderNumber::generate(now),
            user_id: cart.user_id(),
            currency: self.currency.to_string(),
            pricing,
            coupon,
            shipping_address_id: shipping.id,
            billing_address_id: billing.id,
            shipping_address: shipping.snapshot,
            billing_address: billing.snapshot,
            shipping_method: options
                .shipping_method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SHIPPING_METHOD.to_string()),
            customer_notes: options.notes.filter(|n| !n.trim().is_empty()),
            estimated_delivery_date: estimate_delivery_date(now.date_naive(), self.delivery_business_days),
            items,
        })
    }
}
