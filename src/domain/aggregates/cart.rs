//! Cart contents as seen by checkout

use rust_decimal::Decimal;
use serde::Serialize;

/// A cart line joined with the live product row it points at.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
    pub product_name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub variant_size: Option<String>,
    pub variant_color: Option<String>,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }

    pub fn variant_attributes(&self) -> Option<serde_json::Value> {
        if self.variant_size.is_none() && self.variant_color.is_none() { return None; }
        Some(serde_json::json!({ "size": self.variant_size, "color": self.variant_color }))
    }
}

/// A user's cart, loaded once at the start of checkout.
#[derive(Clone, Debug)]
pub struct CheckoutCart {
    user_id: i64,
    lines: Vec<CartLine>,
}

impl CheckoutCart {
    pub fn new(user_id: i64, lines: Vec<CartLine>) -> Self { Self { user_id, lines } }

    pub fn user_id(&self) -> i64 { self.user_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn subtotal(&self) -> Decimal { self.lines.iter().map(CartLine::line_total).sum() }
}
