//! HTTP surface: router, shared state, extractors and handlers.

pub mod admin;
pub mod auth;
pub mod extract;
pub mod orders;
pub mod response;

use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::OrderService;

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-orders"})) }))
        .route("/api/orders", get(orders::list_orders))
        .route("/api/orders/checkout", post(orders::checkout))
        .route("/api/orders/stats", get(orders::my_stats))
        .route("/api/orders/number/:order_number", get(orders::get_order_by_number))
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/orders/:id/status", patch(orders::update_status))
        .route("/api/admin/orders", get(admin::list_orders))
        .route("/api/admin/orders/statistics", get(admin::statistics))
        .route("/api/admin/orders/user/:user_id", get(admin::user_orders))
        .route("/api/admin/orders/:id/status", patch(admin::override_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
