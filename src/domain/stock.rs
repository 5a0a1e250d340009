//! Stock reservation and restoration plans.
//!
//! The database applies these movements; this module decides what they are.
//! Movements are merged per product and ordered by product id so concurrent
//! checkouts touch product rows in the same order.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::{CartLine, OrderItem};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Insufficient stock for {product_name}")]
pub struct StockShortage {
    pub product_id: i64,
    pub product_name: String,
    pub requested: i32,
    pub available: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    pub product_id: i64,
    pub quantity: i32,
}

/// Checks every line against the stock loaded with the cart and names the
/// first product (in cart order) that cannot be covered.
pub fn check_availability(lines: &[CartLine]) -> Result<(), StockShortage> {
    let mut requested: BTreeMap<i64, i32> = BTreeMap::new();
    for line in lines {
        let total = requested.entry(line.product_id).or_insert(0);
        *total = total.saturating_add(line.quantity);
        if *total > line.stock_quantity {
            return Err(StockShortage {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                requested: *total,
                available: line.stock_quantity,
            });
        }
    }
    Ok(())
}

pub fn reservation_plan(lines: &[CartLine]) -> Vec<StockMovement> {
    merge(lines.iter().map(|l| (l.product_id, l.quantity)))
}

/// Quantities to add back when an order is cancelled. Items whose product
/// has since been deleted have nothing to restore.
pub fn restoration_plan(items: &[OrderItem]) -> Vec<StockMovement> {
    merge(items.iter().filter_map(|i| i.product_id.map(|id| (id, i.quantity))))
}

fn merge(entries: impl Iterator<Item = (i64, i32)>) -> Vec<StockMovement> {
    let mut merged: BTreeMap<i64, i32> = BTreeMap::new();
    for (product_id, quantity) in entries {
        let total = merged.entry(product_id).or_insert(0);
        *total = total.saturating_add(quantity);
    }
    merged.into_iter().map(|(product_id, quantity)| StockMovement { product_id, quantity }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::tests::line;
    use crate::domain::aggregates::ItemFulfillmentStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn item(product_id: Option<i64>, quantity: i32) -> OrderItem {
        OrderItem {
            id: 1, order_id: 1, product_id, product_name: "X".into(), product_sku: None, product_image_url: None,
            variant_attributes: None, unit_price: Decimal::ONE, quantity, total_price: Decimal::from(quantity),
            discount: Decimal::ZERO, tax: Decimal::ZERO, fulfillment_status: ItemFulfillmentStatus::Unfulfilled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_availability_names_first_short_product() {
        let lines = vec![line(1, 10, 2, 5), line(2, 10, 4, 3), line(3, 10, 9, 1)];
        let err = check_availability(&lines).unwrap_err();
        assert_eq!(err.product_id, 2);
        assert_eq!(err.requested, 4);
        assert_eq!(err.available, 3);
        assert_eq!(err.to_string(), "Insufficient stock for Product 2");
    }

    #[test]
    fn test_availability_counts_repeated_product_lines_together() {
        let lines = vec![line(1, 10, 2, 3), line(1, 10, 2, 3)];
        assert_eq!(check_availability(&lines).unwrap_err().requested, 4);
        assert!(check_availability(&[line(1, 10, 3, 3)]).is_ok());
    }

    #[test]
    fn test_huge_repeated_quantities_do_not_overflow() {
        let big = i32::MAX - 1;
        let lines = vec![line(1, 10, big, big), line(1, 10, big, big)];
        let err = check_availability(&lines).unwrap_err();
        assert_eq!(err.requested, i32::MAX);
        assert_eq!(reservation_plan(&lines), vec![StockMovement { product_id: 1, quantity: i32::MAX }]);
    }

    #[test]
    fn test_reservation_plan_is_merged_and_ordered() {
        let lines = vec![line(9, 1, 1, 10), line(2, 1, 3, 10), line(9, 1, 4, 10)];
        assert_eq!(
            reservation_plan(&lines),
            vec![StockMovement { product_id: 2, quantity: 3 }, StockMovement { product_id: 9, quantity: 5 }]
        );
    }

    #[test]
    fn test_restoration_plan_uses_recorded_quantities() {
        let items = vec![item(Some(4), 2), item(None, 7), item(Some(1), 1), item(Some(4), 1)];
        assert_eq!(
            restoration_plan(&items),
            vec![StockMovement { product_id: 1, quantity: 1 }, StockMovement { product_id: 4, quantity: 3 }]
        );
    }
}
