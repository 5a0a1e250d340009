//! PostgreSQL access. Functions take any `PgExecutor` so the same query runs
//! against the pool or inside an open transaction (`&mut *tx`).

pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod queries;
