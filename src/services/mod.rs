//! Application services: transactions around the domain rules plus the
//! side effects that follow a commit.

pub mod hooks;
pub mod notify;
pub mod orders;

pub use orders::OrderService;
