//! Error taxonomy for the order core and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::response::ApiResponse;
use crate::domain::aggregates::CouponError;
use crate::domain::checkout::BuildError;
use crate::domain::status::{IllegalTransition, PolicyDenial};
use crate::domain::stock::StockShortage;

pub const ADD_ADDRESS: &str = "ADD_ADDRESS";

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("User not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error(transparent)]
    InsufficientStock(#[from] StockShortage),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("No address found. Please add an address before processing payment.")]
    AddressRequired,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, OrderError>;

impl From<BuildError> for OrderError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::EmptyCart => Self::EmptyCart,
            BuildError::InsufficientStock(shortage) => Self::InsufficientStock(shortage),
        }
    }
}

impl From<PolicyDenial> for OrderError {
    fn from(e: PolicyDenial) -> Self { Self::Forbidden(e.to_string()) }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

impl OrderError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::IllegalTransition(_)
            | Self::Coupon(_)
            | Self::EmptyCart
            | Self::AddressRequired => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InsufficientStock(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            Self::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            Self::Coupon(_) => "COUPON_ERROR",
            Self::EmptyCart => "EMPTY_CART",
            Self::AddressRequired => "ADDRESS_REQUIRED",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// Text returned to the client. Driver detail never leaves the process.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }
        let mut body = ApiResponse::<()>::failure(self.public_message(), self.code());
        if matches!(self, Self::AddressRequired) {
            body.action_required = Some(ADD_ADDRESS);
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OrderStatus;
    use axum::body::to_bytes;

    async fn body_json(err: OrderError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_illegal_transition_maps_to_400() {
        let err = OrderError::from(IllegalTransition { from: OrderStatus::Pending, to: OrderStatus::Shipped });
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "ILLEGAL_TRANSITION");
        assert_eq!(json["message"], "Cannot transition from 'pending' to 'shipped'");
    }

    #[tokio::test]
    async fn test_address_required_carries_action() {
        let (status, json) = body_json(OrderError::AddressRequired).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["actionRequired"], "ADD_ADDRESS");
    }

    #[tokio::test]
    async fn test_database_detail_is_hidden() {
        let (status, json) = body_json(OrderError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(OrderError::NotFound("Order").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(OrderError::NotFound("Order").to_string(), "Order not found");
        assert_eq!(OrderError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(OrderError::from(PolicyDenial::RoleNotPermitted).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(OrderError::from(BuildError::EmptyCart).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(OrderError::from(CouponError::CouponExhausted).status_code(), StatusCode::BAD_REQUEST);
        let shortage = StockShortage { product_id: 1, product_name: "Lamp".into(), requested: 2, available: 1 };
        assert_eq!(OrderError::from(shortage).status_code(), StatusCode::CONFLICT);
        assert_eq!(OrderError::Conflict("busy").status_code(), StatusCode::CONFLICT);
        assert_eq!(OrderError::Conflict("busy").code(), "CONFLICT");
    }
}
