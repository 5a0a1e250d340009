//! Coupon rules and discount evaluation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::value_objects::round_money;

string_enum! {
    DiscountType {
        Percentage => "percentage",
        FixedAmount => "fixed_amount",
        FreeShipping => "free_shipping",
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_purchase_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    pub times_used: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Invalid or expired coupon")]
    InvalidCoupon,
    #[error("Coupon usage limit reached")]
    CouponExhausted,
    #[error("You have already used this coupon")]
    CouponAlreadyUsed,
    #[error("Minimum purchase amount is {minimum}")]
    MinimumPurchaseNotMet { minimum: Decimal },
}

/// Outcome of a successful evaluation, carried into the order draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedCoupon {
    pub coupon_id: i64,
    pub code: String,
    pub discount: Decimal,
    pub waives_shipping: bool,
}

impl Coupon {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from.map_or(true, |from| from <= now)
            && self.valid_until.map_or(true, |until| until >= now)
    }

    /// Whether the caller has to count this user's prior redemptions.
    pub fn limits_per_user(&self) -> bool { self.usage_limit_per_user.is_some() }

    /// Applies the coupon rules in order: validity window, global limit,
    /// per-user limit, minimum purchase, then the bounded discount.
    pub fn evaluate(&self, prior_user_uses: i64, subtotal: Decimal, now: DateTime<Utc>) -> Result<AppliedCoupon, CouponError> {
        if !self.is_live(now) { return Err(CouponError::InvalidCoupon); }
        if let Some(limit) = self.usage_limit {
            if self.times_used >= limit { return Err(CouponError::CouponExhausted); }
        }
        if let Some(limit) = self.usage_limit_per_user {
            if prior_user_uses >= i64::from(limit) { return Err(CouponError::CouponAlreadyUsed); }
        }
        if let Some(minimum) = self.min_purchase_amount {
            if subtotal < minimum { return Err(CouponError::MinimumPurchaseNotMet { minimum }); }
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => round_money(subtotal * self.value / Decimal::ONE_HUNDRED),
            DiscountType::FixedAmount => self.value,
            DiscountType::FreeShipping => Decimal::ZERO,
        };
        let discount = match self.max_discount_amount {
            Some(max) if raw > max => max,
            _ => raw,
        };

        Ok(AppliedCoupon {
            coupon_id: self.id,
            code: self.code.clone(),
            discount,
            waives_shipping: self.discount_type == DiscountType::FreeShipping,
        })
    }
}

/// Rule (a) starts with existence: a code that matched no row is invalid.
pub fn evaluate(coupon: Option<&Coupon>, prior_user_uses: i64, subtotal: Decimal, now: DateTime<Utc>) -> Result<AppliedCoupon, CouponError> {
    coupon.ok_or(CouponError::InvalidCoupon)?.evaluate(prior_user_uses, subtotal, now)
}
