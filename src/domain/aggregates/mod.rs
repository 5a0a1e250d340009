//! Aggregates module

/// Declares a snake_case string enum stored in VARCHAR columns. `$text`
/// must match the snake_case spelling sqlx and serde derive from the variant.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, sqlx::Type,
        )]
        #[serde(rename_all = "snake_case")]
        #[sqlx(type_name = "varchar", rename_all = "snake_case")]
        pub enum $name { $($variant),+ }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub fn as_str(&self) -> &'static str { match self { $($name::$variant => $text),+ } }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
        }
    };
}

pub mod cart;
pub mod coupon;
pub mod order;

pub use cart::{CartLine, CheckoutCart};
pub use coupon::{AppliedCoupon, Coupon, CouponError, DiscountType};
pub use order::{
    AddressSnapshot, FulfillmentStatus, ItemFulfillmentStatus, Order, OrderDetails, OrderItem, OrderStatus,
    OrderSummary, PaymentStatus, StatusHistoryEntry,
};
