//! Collaborator tables read or written during checkout and cancellation:
//! cart, products, addresses, users.

use sqlx::postgres::PgExecutor;

use crate::domain::aggregates::{AddressSnapshot, CartLine};
use crate::domain::checkout::ResolvedAddress;
use crate::domain::stock::StockMovement;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AddressRow {
    pub id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl From<AddressRow> for ResolvedAddress {
    fn from(row: AddressRow) -> Self {
        ResolvedAddress {
            id: row.id,
            snapshot: AddressSnapshot {
                full_name: row.full_name,
                phone: row.phone,
                address_line1: row.address_line1,
                address_line2: row.address_line2,
                city: row.city,
                state: row.state,
                postal_code: row.postal_code,
                country: row.country,
            },
        }
    }
}

const ADDRESS_COLUMNS: &str =
    "id, user_id, full_name, phone, address_line1, address_line2, city, state, postal_code, country, is_default";

/// Cart lines joined with the live product row and its primary image.
pub async fn cart_lines<'e>(db: impl PgExecutor<'e>, user_id: i64) -> sqlx::Result<Vec<CartLine>> {
    sqlx::query_as::<_, CartLine>(
        r#"SELECT ci.product_id, ci.quantity, p.name AS product_name, p.sku, p.price AS unit_price,
                  p.stock_quantity, img.url AS image_url, ci.variant_size, ci.variant_color
           FROM cart_items ci
           JOIN products p ON p.id = ci.product_id
           LEFT JOIN LATERAL (
               SELECT pi.url FROM product_images pi
               WHERE pi.product_id = p.id
               ORDER BY pi.is_primary DESC, pi.id
               LIMIT 1
           ) img ON TRUE
           WHERE ci.user_id = $1
           ORDER BY ci.id"#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn clear_cart<'e>(db: impl PgExecutor<'e>, user_id: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(db).await?;
    Ok(result.rows_affected())
}

/// Conditional decrement. Returns `false` when the row no longer holds
/// enough stock, leaving it untouched.
pub async fn reserve_stock<'e>(db: impl PgExecutor<'e>, movement: &StockMovement) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity - $2 WHERE id = $1 AND stock_quantity >= $2",
    )
    .bind(movement.product_id)
    .bind(movement.quantity)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn restore_stock<'e>(db: impl PgExecutor<'e>, movement: &StockMovement) -> sqlx::Result<()> {
    sqlx::query("UPDATE products SET stock_quantity = stock_quantity + $2 WHERE id = $1")
        .bind(movement.product_id)
        .bind(movement.quantity)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn stock_level<'e>(db: impl PgExecutor<'e>, product_id: i64) -> sqlx::Result<Option<i32>> {
    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(db)
        .await
}

/// An address by id, only if it belongs to `user_id`.
pub async fn find_address<'e>(db: impl PgExecutor<'e>, user_id: i64, address_id: i64) -> sqlx::Result<Option<AddressRow>> {
    sqlx::query_as::<_, AddressRow>(&format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2"))
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

/// The user's default address, else their oldest one.
pub async fn default_address<'e>(db: impl PgExecutor<'e>, user_id: i64) -> sqlx::Result<Option<AddressRow>> {
    sqlx::query_as::<_, AddressRow>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, id LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn user_email<'e>(db: impl PgExecutor<'e>, user_id: i64) -> sqlx::Result<Option<String>> {
    sqlx::query_scalar("SELECT email FROM users WHERE id = $1").bind(user_id).fetch_optional(db).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_row_becomes_snapshot() {
        let row = AddressRow {
            id: 3, user_id: 7, full_name: "Asha Rao".into(), phone: "9800000000".into(),
            address_line1: "12 MG Road".into(), address_line2: None, city: "Pune".into(), state: "MH".into(),
            postal_code: "411001".into(), country: "India".into(), is_default: true,
        };
        let resolved = ResolvedAddress::from(row);
        assert_eq!(resolved.id, 3);
        assert_eq!(resolved.snapshot.city, "Pune");
        assert_eq!(resolved.snapshot.postal_code, "411001");
    }
}
