//! Order rows: insert a draft, lock, apply a transition, read back.

use sqlx::postgres::PgExecutor;
use sqlx::types::Json;
use sqlx::PgConnection;

use crate::domain::aggregates::{Order, OrderItem, OrderStatus, StatusHistoryEntry};
use crate::domain::checkout::OrderDraft;
use crate::domain::status::TransitionPlan;

/// Writes the order header, its items and the creation history row.
/// Runs on a connection so the caller can keep it inside its transaction.
/// Returns `None`, having written nothing, when the draft's order number is
/// already taken; the transaction stays usable for another attempt.
pub async fn insert_draft(conn: &mut PgConnection, draft: &OrderDraft) -> sqlx::Result<Option<(Order, Vec<OrderItem>)>> {
    let pricing = &draft.pricing;
    let order = sqlx::query_as::<_, Order>(
        r#"INSERT INTO orders (
               order_number, user_id, status, payment_status, fulfillment_status,
               subtotal, tax_amount, shipping_amount, discount_amount, total_amount, currency,
               shipping_address_id, billing_address_id, shipping_address, billing_address,
               shipping_method, estimated_delivery_date, coupon_code, coupon_discount, customer_notes
           ) VALUES (
               $1, $2, 'pending', 'pending', 'unfulfilled',
               $3, $4, $5, $6, $7, $8,
               $9, $10, $11, $12,
               $13, $14, $15, $16, $17
           )
           ON CONFLICT (order_number) DO NOTHING
           RETURNING *"#,
    )
    .bind(draft.order_number.as_str())
    .bind(draft.user_id)
    .bind(pricing.subtotal)
    .bind(pricing.tax_amount)
    .bind(pricing.shipping_amount)
    .bind(pricing.discount_amount)
    .bind(pricing.total_amount)
    .bind(&draft.currency)
    .bind(draft.shipping_address_id)
    .bind(draft.billing_address_id)
    .bind(Json(&draft.shipping_address))
    .bind(Json(&draft.billing_address))
    .bind(&draft.shipping_method)
    .bind(draft.estimated_delivery_date)
    .bind(draft.coupon.as_ref().map(|c| c.code.as_str()))
    .bind(if draft.coupon.is_some() { pricing.discount_amount } else { Default::default() })
    .bind(draft.customer_notes.as_deref())
    .fetch_optional(&mut *conn)
    .await?;
    let Some(order) = order else { return Ok(None) };

    let mut items = Vec::with_capacity(draft.items.len());
    for item in &draft.items {
        let row = sqlx::query_as::<_, OrderItem>(
            r#"INSERT INTO order_items (
                   order_id, product_id, product_name, product_sku, product_image_url,
                   variant_attributes, unit_price, quantity, total_price
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING *"#,
        )
        .bind(order.id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(item.product_sku.as_deref())
        .bind(item.product_image_url.as_deref())
        .bind(item.variant_attributes.as_ref().map(Json))
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.total_price)
        .fetch_one(&mut *conn)
        .await?;
        items.push(row);
    }

    append_history(&mut *conn, order.id, None, OrderStatus::Pending, Some(draft.user_id), Some("Order placed")).await?;

    Ok(Some((order, items)))
}

/// Loads the order row with `FOR UPDATE`; concurrent transitions on the same
/// order wait here until the holder commits.
pub async fn lock_order<'e>(db: impl PgExecutor<'e>, order_id: i64) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(db)
        .await
}

/// Sets the new status and the plan's column effects. `NULL` parameters
/// leave the existing column value in place.
pub async fn apply_transition<'e>(db: impl PgExecutor<'e>, order_id: i64, plan: &TransitionPlan) -> sqlx::Result<Order> {
    let effects = &plan.effects;
    sqlx::query_as::<_, Order>(
        r#"UPDATE orders SET
               status = $2,
               confirmed_at = COALESCE($3, confirmed_at),
               shipped_at = COALESCE($4, shipped_at),
               delivered_at = COALESCE($5, delivered_at),
               actual_delivery_date = COALESCE(($5::TIMESTAMPTZ)::DATE, actual_delivery_date),
               fulfillment_status = COALESCE($6, fulfillment_status),
               cancelled_at = COALESCE($7, cancelled_at),
               cancelled_by = COALESCE($8, cancelled_by),
               cancellation_reason = COALESCE($9, cancellation_reason),
               tracking_number = COALESCE($10, tracking_number),
               carrier = COALESCE($11, carrier),
               updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(order_id)
    .bind(plan.to)
    .bind(effects.confirmed_at)
    .bind(effects.shipped_at)
    .bind(effects.delivered_at)
    .bind(effects.fulfillment_status)
    .bind(effects.cancelled_at)
    .bind(effects.cancelled_by)
    .bind(effects.cancellation_reason.as_deref())
    .bind(effects.tracking_number.as_deref())
    .bind(effects.carrier.as_deref())
    .fetch_one(db)
    .await
}

pub async fn append_history<'e>(
    db: impl PgExecutor<'e>,
    order_id: i64,
    old_status: Option<OrderStatus>,
    new_status: OrderStatus,
    changed_by: Option<i64>,
    notes: Option<&str>,
) -> sqlx::Result<StatusHistoryEntry> {
    sqlx::query_as::<_, StatusHistoryEntry>(
        r#"INSERT INTO order_status_history (order_id, old_status, new_status, changed_by, notes)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING *"#,
    )
    .bind(order_id)
    .bind(old_status)
    .bind(new_status)
    .bind(changed_by)
    .bind(notes)
    .fetch_one(db)
    .await
}

pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, order_id: i64) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(db).await
}

pub async fn find_by_number<'e>(db: impl PgExecutor<'e>, order_number: &str) -> sqlx::Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(db)
        .await
}

pub async fn items_for<'e>(db: impl PgExecutor<'e>, order_id: i64) -> sqlx::Result<Vec<OrderItem>> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(db)
        .await
}

/// Newest first.
pub async fn history_for<'e>(db: impl PgExecutor<'e>, order_id: i64) -> sqlx::Result<Vec<StatusHistoryEntry>> {
    sqlx::query_as::<_, StatusHistoryEntry>(
        "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(order_id)
    .fetch_all(db)
    .await
}
