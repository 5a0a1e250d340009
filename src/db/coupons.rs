use sqlx::postgres::PgExecutor;

use crate::domain::aggregates::{AppliedCoupon, Coupon};

/// Loads and row-locks a coupon so `times_used` cannot move under a
/// concurrent checkout before this transaction commits.
pub async fn find_for_update<'e>(db: impl PgExecutor<'e>, code: &str) -> sqlx::Result<Option<Coupon>> {
    sqlx::query_as::<_, Coupon>(
        r#"SELECT id, code, description, type, value, min_purchase_amount, max_discount_amount,
                  usage_limit, usage_limit_per_user, times_used, valid_from, valid_until, is_active
           FROM coupons WHERE code = $1
           FOR UPDATE"#,
    )
    .bind(code)
    .fetch_optional(db)
    .await
}

pub async fn count_usage<'e>(db: impl PgExecutor<'e>, coupon_id: i64, user_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM coupon_usage WHERE coupon_id = $1 AND user_id = $2")
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(db)
        .await
}

pub async fn insert_usage<'e>(db: impl PgExecutor<'e>, applied: &AppliedCoupon, user_id: i64, order_id: i64) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO coupon_usage (coupon_id, user_id, order_id, discount_amount) VALUES ($1, $2, $3, $4)")
        .bind(applied.coupon_id)
        .bind(user_id)
        .bind(order_id)
        .bind(applied.discount)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn increment_times_used<'e>(db: impl PgExecutor<'e>, coupon_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE coupons SET times_used = times_used + 1, updated_at = NOW() WHERE id = $1")
        .bind(coupon_id)
        .execute(db)
        .await?;
    Ok(())
}
