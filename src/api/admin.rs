//! Admin endpoints under `/api/admin/orders`.

use axum::extract::State;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::api::auth::AdminUser;
use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::orders::{PageParams, StatusBody, USER_PAGE_LIMIT};
use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::db::queries::{OrderFilter, OrderStats, Page};
use crate::domain::aggregates::{OrderStatus, PaymentStatus};
use crate::error::Result;
use crate::services::orders::{OrderPage, StatusUpdate, UserOverview};

pub const ADMIN_PAGE_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdminListParams {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    #[validate(length(max = 100))]
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

impl AdminListParams {
    fn into_parts(self) -> (OrderFilter, Page) {
        let page = Page { limit: self.limit.unwrap_or(ADMIN_PAGE_LIMIT), offset: self.offset.unwrap_or(0) };
        let filter = OrderFilter {
            status: self.status,
            payment_status: self.payment_status,
            search: self.search,
            date_from: self.date_from,
            date_to: self.date_to,
        };
        (filter, page)
    }
}

pub async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ValidQuery(params): ValidQuery<AdminListParams>,
) -> Result<ApiResponse<OrderPage>> {
    let (filter, page) = params.into_parts();
    Ok(ApiResponse::ok(state.orders.admin_list(filter, page).await?))
}

pub async fn statistics(State(state): State<AppState>, AdminUser(_): AdminUser) -> Result<ApiResponse<OrderStats>> {
    Ok(ApiResponse::ok(state.orders.stats(None).await?))
}

pub async fn user_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ValidPath(user_id): ValidPath<i64>,
    ValidQuery(params): ValidQuery<PageParams>,
) -> Result<ApiResponse<UserOverview>> {
    Ok(ApiResponse::ok(state.orders.user_overview(user_id, params.page(USER_PAGE_LIMIT)).await?))
}

/// Sets any status, bypassing the forward table.
pub async fn override_status(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    ValidPath(order_id): ValidPath<i64>,
    ValidJson(body): ValidJson<StatusBody>,
) -> Result<ApiResponse<StatusUpdate>> {
    let shipment = body.shipment();
    let update = state.orders.override_status(order_id, actor, body.status, body.notes, shipment).await?;
    let message = format!("Order status updated to {}", update.order.status);
    Ok(ApiResponse::ok(update).with_message(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_params_defaults() {
        let (filter, page) = AdminListParams::default().into_parts();
        assert_eq!(page, Page { limit: 50, offset: 0 });
        assert!(filter.status.is_none());
    }

    #[test]
    fn test_admin_params_parse_filters() {
        let params: AdminListParams = serde_json::from_value(serde_json::json!({
            "status": "out_for_delivery",
            "payment_status": "paid",
            "date_from": "2024-05-01",
            "limit": 10
        }))
        .unwrap();
        assert!(params.validate().is_ok());
        let (filter, page) = params.into_parts();
        assert_eq!(filter.status, Some(OrderStatus::OutForDelivery));
        assert_eq!(filter.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(page.limit, 10);
    }
}
