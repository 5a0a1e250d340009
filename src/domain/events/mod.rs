//! Domain events and notification payloads emitted after commit.
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderItem, OrderStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    OrderPlaced {
        event_id: Uuid,
        order_id: i64,
        order_number: String,
        user_id: Option<i64>,
        total_amount: Decimal,
        currency: String,
        item_count: usize,
        created_at: DateTime<Utc>,
    },
    OrderStatusChanged {
        event_id: Uuid,
        order_id: i64,
        order_number: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: i64,
        created_at: DateTime<Utc>,
    },
}

impl OrderEvent {
    pub fn placed(order: &Order, items: &[OrderItem]) -> Self {
        Self::OrderPlaced {
            event_id: Uuid::now_v7(),
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            total_amount: order.total_amount,
            currency: order.currency.clone(),
            item_count: items.len(),
            created_at: Utc::now(),
        }
    }

    pub fn status_changed(order: &Order, old_status: OrderStatus, changed_by: i64) -> Self {
        Self::OrderStatusChanged {
            event_id: Uuid::now_v7(),
            order_id: order.id,
            order_number: order.order_number.clone(),
            old_status,
            new_status: order.status,
            changed_by,
            created_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "ORDER_PLACED",
            Self::OrderStatusChanged { .. } => "ORDER_STATUS_CHANGED",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NotificationLine {
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Customer confirmation email/SMS payload.
#[derive(Clone, Debug, Serialize)]
pub struct OrderNotification {
    pub to: String,
    pub order_number: String,
    pub full_name: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub items: Vec<NotificationLine>,
}

impl OrderNotification {
    pub fn for_order(order: &Order, items: &[OrderItem], to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            order_number: order.order_number.clone(),
            full_name: order.shipping_address.as_ref().map(|a| a.full_name.clone()).unwrap_or_default(),
            total_amount: order.total_amount,
            currency: order.currency.clone(),
            estimated_delivery_date: order.estimated_delivery_date,
            items: items
                .iter()
                .map(|i| NotificationLine { product_name: i.product_name.clone(), quantity: i.quantity, unit_price: i.unit_price })
                .collect(),
        }
    }
}

/// Message shown to the customer once checkout succeeds.
pub fn confirmation_message(order: &Order) -> String {
    let delivery = order
        .estimated_delivery_date
        .map(|d| d.format("%a %b %d %Y").to_string())
        .unwrap_or_else(|| "soon".to_string());
    format!(
        "Order {} placed successfully! Expected delivery by {}. Total: {} {:.2}.",
        order.order_number, delivery, order.currency, order.total_amount
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::sample_order;
    use crate::domain::aggregates::AddressSnapshot;
    use sqlx::types::Json;

    #[test]
    fn test_event_serialises_with_type_tag() {
        let order = sample_order(OrderStatus::Confirmed);
        let event = OrderEvent::status_changed(&order, OrderStatus::Pending, 20);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ORDER_STATUS_CHANGED");
        assert_eq!(json["old_status"], "pending");
        assert_eq!(json["new_status"], "confirmed");
        assert_eq!(event.name(), "ORDER_STATUS_CHANGED");
        assert_eq!(OrderEvent::placed(&order, &[]).name(), "ORDER_PLACED");
    }

    #[test]
    fn test_notification_uses_shipping_name() {
        let mut order = sample_order(OrderStatus::Pending);
        order.shipping_address = Some(Json(AddressSnapshot { full_name: "Asha Rao".into(), ..Default::default() }));
        let n = OrderNotification::for_order(&order, &[], "asha@example.com");
        assert_eq!(n.full_name, "Asha Rao");
        assert_eq!(n.to, "asha@example.com");
        assert_eq!(n.total_amount, Decimal::new(286, 0));
    }

    #[test]
    fn test_confirmation_message() {
        let mut order = sample_order(OrderStatus::Pending);
        assert_eq!(
            confirmation_message(&order),
            "Order ORD-1700000000000-001 placed successfully! Expected delivery by soon. Total: INR 286.00."
        );
        order.estimated_delivery_date = NaiveDate::from_ymd_opt(2024, 5, 10);
        assert!(confirmation_message(&order).contains("Fri May 10 2024"));
    }
}
