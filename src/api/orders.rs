//! Customer and vendor order endpoints under `/api/orders`.

use axum::body::Bytes;
use axum::extract::State;
use serde::Deserialize;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::db::queries::{OrderStats, Page};
use crate::domain::aggregates::{OrderDetails, OrderStatus};
use crate::domain::status::Shipment;
use crate::domain::value_objects::OrderNumber;
use crate::error::{OrderError, Result};
use crate::services::orders::{CheckoutRequest, OrderPage, PlacedOrder, StatusUpdate};

pub const USER_PAGE_LIMIT: i64 = 20;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[validate(range(min = 1))]
    pub shipping_address_id: Option<i64>,
    #[validate(range(min = 1))]
    pub billing_address_id: Option<i64>,
    #[validate(length(min = 1, max = 50))]
    pub shipping_method: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub coupon_code: Option<String>,
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        Self {
            shipping_address_id: body.shipping_address_id,
            billing_address_id: body.billing_address_id,
            shipping_method: body.shipping_method,
            notes: body.notes,
            coupon_code: body.coupon_code,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: OrderStatus,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub tracking_number: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub carrier: Option<String>,
}

impl StatusBody {
    pub fn shipment(&self) -> Shipment {
        Shipment { tracking_number: self.tracking_number.clone(), carrier: self.carrier.clone() }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelBody {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PageParams {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

impl PageParams {
    pub fn page(&self, default_limit: i64) -> Page {
        Page { limit: self.limit.unwrap_or(default_limit), offset: self.offset.unwrap_or(0) }
    }
}

pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidJson(body): ValidJson<CheckoutBody>,
) -> Result<ApiResponse<PlacedOrder>> {
    let placed = state.orders.checkout(actor.user_id, body.into()).await?;
    let message = placed.message.clone();
    Ok(ApiResponse::ok(placed).with_message(message))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidQuery(params): ValidQuery<PageParams>,
) -> Result<ApiResponse<OrderPage>> {
    let page = state.orders.list_for_user(actor.user_id, params.page(USER_PAGE_LIMIT)).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn my_stats(State(state): State<AppState>, AuthUser(actor): AuthUser) -> Result<ApiResponse<OrderStats>> {
    Ok(ApiResponse::ok(state.orders.stats(Some(actor.user_id)).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidPath(order_id): ValidPath<i64>,
) -> Result<ApiResponse<OrderDetails>> {
    Ok(ApiResponse::ok(state.orders.get(order_id, actor).await?))
}

pub async fn get_order_by_number(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidPath(order_number): ValidPath<String>,
) -> Result<ApiResponse<OrderDetails>> {
    let number = OrderNumber::parse(order_number).map_err(|e| OrderError::Validation(e.to_string()))?;
    Ok(ApiResponse::ok(state.orders.get_by_number(number.as_str(), actor).await?))
}

/// The body is optional; an empty one means "no reason given".
pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidPath(order_id): ValidPath<i64>,
    body: Bytes,
) -> Result<ApiResponse<StatusUpdate>> {
    let body: CancelBody = if body.is_empty() {
        CancelBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| OrderError::Validation(e.to_string()))?
    };
    body.validate()?;
    let update = state.orders.cancel(order_id, actor, body.reason).await?;
    Ok(ApiResponse::ok(update).with_message("Order cancelled successfully"))
}

pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidPath(order_id): ValidPath<i64>,
    ValidJson(body): ValidJson<StatusBody>,
) -> Result<ApiResponse<StatusUpdate>> {
    let shipment = body.shipment();
    let update = state.orders.advance(order_id, actor, body.status, body.notes, shipment).await?;
    let message = format!("Order status updated to {}", update.order.status);
    Ok(ApiResponse::ok(update).with_message(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_body_reads_camel_case() {
        let body: CheckoutBody =
            serde_json::from_str(r#"{"shippingAddressId": 3, "couponCode": "SAVE10", "shippingMethod": "express"}"#).unwrap();
        assert_eq!(body.shipping_address_id, Some(3));
        assert!(body.validate().is_ok());
        let request = CheckoutRequest::from(body);
        assert_eq!(request.coupon_code.as_deref(), Some("SAVE10"));
        assert!(request.billing_address_id.is_none());
    }

    #[test]
    fn test_checkout_body_limits() {
        let body = CheckoutBody { shipping_address_id: Some(0), ..Default::default() };
        assert!(body.validate().is_err());
        let body = CheckoutBody { coupon_code: Some(String::new()), ..Default::default() };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_status_body() {
        let body: StatusBody =
            serde_json::from_str(r#"{"status": "shipped", "trackingNumber": "TRK1", "carrier": "BlueDart"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Shipped);
        assert_eq!(body.shipment().tracking_number.as_deref(), Some("TRK1"));
        assert!(serde_json::from_str::<StatusBody>(r#"{"status": "lost"}"#).is_err());
    }

    #[test]
    fn test_page_defaults_and_bounds() {
        let params = PageParams::default();
        assert_eq!(params.page(USER_PAGE_LIMIT), Page { limit: 20, offset: 0 });
        assert!(PageParams { limit: Some(500), offset: None }.validate().is_err());
        assert!(PageParams { limit: Some(10), offset: Some(-1) }.validate().is_err());
    }
}
