//! Order Aggregate

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

string_enum! {
    /// Lifecycle status of an order.
    OrderStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Processing => "processing",
        Packed => "packed",
        Shipped => "shipped",
        OutForDelivery => "out_for_delivery",
        Delivered => "delivered",
        Cancelled => "cancelled",
        Refunded => "refunded",
    }
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    /// Statuses a customer may still cancel from.
    pub fn is_customer_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Order Confirmed",
            Self::Processing => "Processing",
            Self::Packed => "Packed",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        }
    }
}

string_enum! {
    PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Refunded => "refunded",
        PartiallyRefunded => "partially_refunded",
    }
}

string_enum! {
    FulfillmentStatus {
        Unfulfilled => "unfulfilled",
        PartiallyFulfilled => "partially_fulfilled",
        Fulfilled => "fulfilled",
        Returned => "returned",
    }
}

string_enum! {
    ItemFulfillmentStatus {
        Unfulfilled => "unfulfilled",
        Fulfilled => "fulfilled",
        Returned => "returned",
        Cancelled => "cancelled",
    }
}

/// Address fields copied onto the order when it is placed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: Option<i64>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub shipping_address_id: Option<i64>,
    pub billing_address_id: Option<i64>,
    pub shipping_address: Option<Json<AddressSnapshot>>,
    pub billing_address: Option<Json<AddressSnapshot>>,
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
    pub coupon_code: Option<String>,
    pub coupon_discount: Decimal,
    pub customer_notes: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
    pub cancellation_reason: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: i64) -> bool { self.user_id == Some(user_id) }

    /// `total = subtotal - discount + tax + shipping`, with every component non-negative.
    pub fn totals_balance(&self) -> bool {
        let parts = [self.subtotal, self.discount_amount, self.tax_amount, self.shipping_amount, self.total_amount];
        parts.iter().all(|p| !p.is_sign_negative())
            && self.total_amount == self.subtotal - self.discount_amount + self.tax_amount + self.shipping_amount
    }
}

/// Immutable line snapshot; product fields are copied at purchase time.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub product_image_url: Option<String>,
    pub variant_attributes: Option<Json<serde_json::Value>>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub fulfillment_status: ItemFulfillmentStatus,
    pub created_at: DateTime<Utc>,
}

/// One append-only audit row per status change.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: i64,
    pub old_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub changed_by: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// List row: order header plus item count and the owner's contact fields.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: &'static str,
    pub items: Vec<OrderItem>,
    pub status_history: Vec<StatusHistoryEntry>,
}

impl OrderDetails {
    pub fn new(order: Order, items: Vec<OrderItem>, status_history: Vec<StatusHistoryEntry>) -> Self {
        Self { status_label: order.status.label(), order, items, status_history }
    }
}
