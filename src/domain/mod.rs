//! Order placement domain: pure rules, no I/O.
pub mod aggregates;
pub mod checkout;
pub mod events;
pub mod pricing;
pub mod status;
pub mod stock;
pub mod value_objects;
