//! Read model: paginated lists and statistics.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::PgExecutor;
use sqlx::{Postgres, QueryBuilder};

use crate::domain::aggregates::{OrderStatus, OrderSummary, PaymentStatus};

const SUMMARY_SELECT: &str = r#"SELECT o.*,
       (SELECT COUNT(*) FROM order_items oi WHERE oi.order_id = o.id) AS item_count,
       u.email, u.first_name, u.last_name
FROM orders o
LEFT JOIN users u ON u.id = o.user_id"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Admin list filters. Every field is optional and they combine with AND.
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    /// Inclusive: orders created any time on this date match.
    pub date_to: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderTotals {
    pub total_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    pub total_spent: Decimal,
    pub average_order_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub by_status: Vec<StatusCount>,
}

pub async fn list_for_user<'e>(db: impl PgExecutor<'e>, user_id: i64, page: Page) -> sqlx::Result<Vec<OrderSummary>> {
    sqlx::query_as::<_, OrderSummary>(&format!(
        "{SUMMARY_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(db)
    .await
}

pub async fn count_for_user<'e>(db: impl PgExecutor<'e>, user_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1").bind(user_id).fetch_one(db).await
}

/// Escapes LIKE metacharacters so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND o.status = ").push_bind(status);
    }
    if let Some(payment_status) = filter.payment_status {
        qb.push(" AND o.payment_status = ").push_bind(payment_status);
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = like_pattern(term);
        qb.push(" AND (o.order_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND o.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND o.created_at < ").push_bind(to + Duration::days(1));
    }
}

pub async fn list_all<'e>(db: impl PgExecutor<'e>, filter: &OrderFilter, page: Page) -> sqlx::Result<Vec<OrderSummary>> {
    let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);
    qb.build_query_as::<OrderSummary>().fetch_all(db).await
}

pub async fn count_all<'e>(db: impl PgExecutor<'e>, filter: &OrderFilter) -> sqlx::Result<i64> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o LEFT JOIN users u ON u.id = o.user_id");
    push_filters(&mut qb, filter);
    qb.build_query_scalar::<i64>().fetch_one(db).await
}

/// Statistics for one user, or across every order when `user_id` is `None`.
pub async fn totals<'e>(db: impl PgExecutor<'e>, user_id: Option<i64>) -> sqlx::Result<OrderTotals> {
    sqlx::query_as::<_, OrderTotals>(
        r#"SELECT COUNT(*) AS total_orders,
                  COUNT(*) FILTER (WHERE status = 'delivered') AS delivered_orders,
                  COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders,
                  COALESCE(SUM(total_amount), 0) AS total_spent,
                  COALESCE(ROUND(AVG(total_amount), 2), 0) AS average_order_value
           FROM orders
           WHERE $1::BIGINT IS NULL OR user_id = $1"#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn status_counts<'e>(db: impl PgExecutor<'e>, user_id: Option<i64>) -> sqlx::Result<Vec<StatusCount>> {
    sqlx::query_as::<_, StatusCount>(
        r#"SELECT status, COUNT(*) AS count
           FROM orders
           WHERE $1::BIGINT IS NULL OR user_id = $1
           GROUP BY status
           ORDER BY status"#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ORD-17"), "%ORD-17%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_filters_render_in_order() {
        let filter = OrderFilter {
            status: Some(OrderStatus::Shipped),
            search: Some("  asha ".into()),
            date_to: NaiveDate::from_ymd_opt(2024, 5, 10),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM orders o");
        push_filters(&mut qb, &filter);
        assert_eq!(
            qb.sql(),
            "SELECT 1 FROM orders o WHERE TRUE AND o.status = $1 AND (o.order_number ILIKE $2 OR u.email ILIKE $3) AND o.created_at < $4"
        );
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = OrderFilter { search: Some("   ".into()), ..Default::default() };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM orders o");
        push_filters(&mut qb, &filter);
        assert_eq!(qb.sql(), "SELECT 1 FROM orders o WHERE TRUE");
    }
}
