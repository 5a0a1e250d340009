//! OpenSASE Orders - checkout and order lifecycle service
//!
//! Turns a customer's cart into a persisted order and drives it through its
//! lifecycle.
//!
//! ## Features
//! - Checkout with stock reservation, coupon accounting and address snapshots
//! - Status state machine with per-role authorization and an audit trail
//! - Stock restoration on cancellation
//! - Order lists, detail views and statistics for customers and admins
//! - `ORDER_PLACED` / `ORDER_STATUS_CHANGED` events over NATS

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod services;

pub use config::{AppConfig, OrderSettings};
pub use error::{OrderError, Result};
pub use services::OrderService;
