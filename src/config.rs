//! Environment configuration.
//!
//! Values come from the process environment (a `.env` file is loaded first by
//! `main`). Everything except `DATABASE_URL` has a default.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::pricing::PricingPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub events_subject: String,
    pub orders: OrderSettings,
}

/// Checkout policy knobs shared by the order service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSettings {
    pub pricing: PricingPolicy,
    pub currency: String,
    pub delivery_business_days: u32,
    pub free_shipping_coupons_waive_shipping: bool,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            currency: "INR".to_string(),
            delivery_business_days: 5,
            free_shipping_coupons_waive_shipping: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = OrderSettings::default();
        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty()).ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let tax_rate: Decimal = parse(&lookup, "TAX_RATE", defaults.pricing.tax_rate)?;
        if tax_rate.is_sign_negative() || tax_rate >= Decimal::ONE {
            return Err(ConfigError::Invalid { key: "TAX_RATE", value: tax_rate.to_string() });
        }

        let currency = lookup("ORDER_CURRENCY").unwrap_or(defaults.currency).to_uppercase();
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid { key: "ORDER_CURRENCY", value: currency });
        }

        Ok(Self {
            database_url,
            port: parse(&lookup, "PORT", 8083)?,
            max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            events_subject: lookup("ORDER_EVENTS_SUBJECT").unwrap_or_else(|| "orders.events".to_string()),
            orders: OrderSettings {
                pricing: PricingPolicy {
                    tax_rate,
                    free_shipping_threshold: non_negative(&lookup, "FREE_SHIPPING_THRESHOLD", defaults.pricing.free_shipping_threshold)?,
                    flat_shipping_fee: non_negative(&lookup, "FLAT_SHIPPING_FEE", defaults.pricing.flat_shipping_fee)?,
                },
                currency,
                delivery_business_days: parse(&lookup, "DELIVERY_BUSINESS_DAYS", defaults.delivery_business_days)?,
                free_shipping_coupons_waive_shipping: parse(
                    &lookup,
                    "FREE_SHIPPING_COUPONS_WAIVE_SHIPPING",
                    defaults.free_shipping_coupons_waive_shipping,
                )?,
            },
        })
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn non_negative(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
    let value: Decimal = parse(lookup, key, default)?;
    if value.is_sign_negative() {
        return Err(ConfigError::Invalid { key, value: value.to_string() });
    }
    Ok(value)
}
