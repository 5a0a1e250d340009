//! Order service: checkout, status changes and reads.
//!
//! Every write runs in one database transaction that commits or rolls back
//! as a unit; an early `?` return drops the transaction, which rolls it back.
//! Side effects (confirmation, events) run only after commit.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info, instrument, warn};

use crate::config::OrderSettings;
use crate::db::queries::{OrderFilter, OrderStats, Page};
use crate::db::{catalog, coupons, orders, queries};
use crate::domain::aggregates::{coupon, AppliedCoupon, CheckoutCart, Order, OrderDetails, OrderItem, OrderStatus, OrderSummary};
use crate::domain::checkout::{self, CheckoutOptions, OrderBuilder, ResolvedAddress};
use crate::domain::events::{confirmation_message, OrderEvent, OrderNotification};
use crate::domain::status::{self, Actor, Shipment, StatusCommand};
use crate::domain::stock::{self, StockShortage};
use crate::domain::value_objects::OrderNumber;
use crate::error::{OrderError, Result};
use crate::services::hooks::{PostCommitHooks, PostOrderReport};
use crate::services::notify::{self, EventPublisher};

/// Order numbers tried per checkout before giving up with a conflict.
pub const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// Checkout input after HTTP validation.
#[derive(Clone, Debug, Default)]
pub struct CheckoutRequest {
    pub shipping_address_id: Option<i64>,
    pub billing_address_id: Option<i64>,
    pub shipping_method: Option<String>,
    pub notes: Option<String>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub post_order: PostOrderReport,
    #[serde(skip)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdate {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub post_order: PostOrderReport,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct UserOverview {
    pub user_id: i64,
    #[serde(flatten)]
    pub page: OrderPage,
    pub stats: OrderStats,
}

#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    settings: Arc<OrderSettings>,
    events: EventPublisher,
}

impl OrderService {
    pub fn new(pool: PgPool, settings: OrderSettings, events: EventPublisher) -> Self {
        Self { pool, settings: Arc::new(settings), events }
    }

    /// Turns the user's cart into an order. Stock, cart, coupon accounting
    /// and the order rows change together or not at all.
    #[instrument(skip(self, request), fields(coupon = request.coupon_code.as_deref()))]
    pub async fn checkout(&self, user_id: i64, request: CheckoutRequest) -> Result<PlacedOrder> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start checkout transaction");
            e
        })?;

        let cart = CheckoutCart::new(user_id, catalog::cart_lines(&mut *tx, user_id).await?);
        if let Err(e) = checkout::ensure_ready(&cart) {
            warn!(error = %e, lines = cart.lines().len(), "Checkout rejected");
            return Err(e.into());
        }

        let (shipping, billing) =
            resolve_addresses(&mut tx, user_id, request.shipping_address_id, request.billing_address_id).await?;

        let coupon = match request.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(apply_coupon(&mut tx, code, user_id, cart.subtotal(), now).await?),
            None => None,
        };

        let builder = OrderBuilder {
            policy: &self.settings.pricing,
            currency: &self.settings.currency,
            delivery_business_days: self.settings.delivery_business_days,
            free_shipping_coupons_waive_shipping: self.settings.free_shipping_coupons_waive_shipping,
        };
        let options = CheckoutOptions { shipping_method: request.shipping_method, notes: request.notes };
        let mut draft = builder.build(&cart, coupon, shipping, billing, options, now)?;

        let mut attempt = 1;
        let (order, items) = loop {
            let inserted = orders::insert_draft(&mut tx, &draft).await.map_err(|e| {
                error!(error = %e, order_number = %draft.order_number, "Failed to insert order");
                e
            })?;
            match inserted {
                Some(inserted) => break inserted,
                None if attempt < ORDER_NUMBER_ATTEMPTS => {
                    warn!(order_number = %draft.order_number, attempt, "Order number taken, generating another");
                    draft.order_number = OrderNumber::generate(Utc::now());
                    attempt += 1;
                }
                None => return Err(OrderError::Conflict("Could not allocate an order number, please retry")),
            }
        };

        for movement in stock::reservation_plan(cart.lines()) {
            if !catalog::reserve_stock(&mut *tx, &movement).await? {
                let available = catalog::stock_level(&mut *tx, movement.product_id).await?.unwrap_or(0);
                let product_name = cart
                    .lines()
                    .iter()
                    .find(|l| l.product_id == movement.product_id)
                    .map(|l| l.product_name.clone())
                    .unwrap_or_default();
                warn!(product_id = movement.product_id, requested = movement.quantity, available, "Stock moved during checkout");
                return Err(StockShortage { product_id: movement.product_id, product_name, requested: movement.quantity, available }.into());
            }
        }

        catalog::clear_cart(&mut *tx, user_id).await?;

        if let Some(applied) = &draft.coupon {
            coupons::insert_usage(&mut *tx, applied, user_id, order.id).await?;
            coupons::increment_times_used(&mut *tx, applied.coupon_id).await?;
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, order_id = order.id, "Failed to commit checkout transaction");
            e
        })?;
        info!(order_id = order.id, order_number = %order.order_number, total = %order.total_amount, "Order placed");

        let post_order = self.after_placement(&order, &items).await;
        Ok(PlacedOrder { message: confirmation_message(&order), order, items, post_order })
    }

    async fn after_placement(&self, order: &Order, items: &[OrderItem]) -> PostOrderReport {
        let event = OrderEvent::placed(order, items);
        PostCommitHooks::new()
            .add(
                "send_confirmation",
                async move {
                    let user_id = order.user_id.context("order has no owner")?;
                    let email = catalog::user_email(&self.pool, user_id).await?.unwrap_or_default();
                    notify::send_confirmation(&OrderNotification::for_order(order, items, email)).await
                }
                .boxed(),
            )
            .add("emit_event", async move { self.events.publish(&event).await }.boxed())
            .run()
            .await
    }

    /// Owner cancellation, allowed while the order is pending or confirmed.
    pub async fn cancel(&self, order_id: i64, actor: Actor, reason: Option<String>) -> Result<StatusUpdate> {
        self.change_status(order_id, actor, StatusCommand::Cancel { reason }).await
    }

    /// Vendor/admin move along the forward transition table.
    pub async fn advance(
        &self,
        order_id: i64,
        actor: Actor,
        to: OrderStatus,
        notes: Option<String>,
        shipment: Shipment,
    ) -> Result<StatusUpdate> {
        self.change_status(order_id, actor, StatusCommand::Advance { to, notes, shipment }).await
    }

    /// Admin-only: set any status other than the current one. Cancelled
    /// orders stay cancelled.
    pub async fn override_status(
        &self,
        order_id: i64,
        actor: Actor,
        to: OrderStatus,
        notes: Option<String>,
        shipment: Shipment,
    ) -> Result<StatusUpdate> {
        self.change_status(order_id, actor, StatusCommand::Override { to, notes, shipment }).await
    }

    #[instrument(skip(self, command), fields(target = %command.target()))]
    pub async fn change_status(&self, order_id: i64, actor: Actor, command: StatusCommand) -> Result<StatusUpdate> {
        status::authorize_role(&actor, &command).map_err(|denial| {
            warn!(reason = %denial, "Status change denied");
            OrderError::from(denial)
        })?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start status transaction");
            e
        })?;

        let current = orders::lock_order(&mut *tx, order_id).await?.ok_or_else(|| {
            warn!("Order not found for status update");
            OrderError::NotFound("Order")
        })?;

        status::authorize(&actor, &command, current.user_id).map_err(|denial| {
            warn!(reason = %denial, "Status change denied");
            OrderError::from(denial)
        })?;

        let plan = status::plan_transition(current.status, &command, &actor, Utc::now()).map_err(|e| {
            warn!(error = %e, "Illegal status transition");
            OrderError::from(e)
        })?;

        let order = orders::apply_transition(&mut *tx, order_id, &plan).await?;
        orders::append_history(&mut *tx, order_id, Some(plan.from), plan.to, Some(plan.changed_by), plan.notes.as_deref()).await?;

        if plan.effects.restore_stock {
            let items = orders::items_for(&mut *tx, order_id).await?;
            for movement in stock::restoration_plan(&items) {
                catalog::restore_stock(&mut *tx, &movement).await?;
            }
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit status transaction");
            e
        })?;
        info!(old_status = %plan.from, new_status = %plan.to, "Order status updated");

        let event = OrderEvent::status_changed(&order, plan.from, plan.changed_by);
        let post_order = PostCommitHooks::new().add("emit_event", self.events.publish(&event).boxed()).run().await;
        Ok(StatusUpdate { order, previous_status: plan.from, post_order })
    }

    /// Detail view for the owner or an admin. Anyone else gets `NotFound`.
    #[instrument(skip(self))]
    pub async fn get(&self, order_id: i64, actor: Actor) -> Result<OrderDetails> {
        let order = orders::find_by_id(&self.pool, order_id).await?;
        self.details(order, actor).await
    }

    #[instrument(skip(self))]
    pub async fn get_by_number(&self, order_number: &str, actor: Actor) -> Result<OrderDetails> {
        let order = orders::find_by_number(&self.pool, order_number).await?;
        self.details(order, actor).await
    }

    async fn details(&self, order: Option<Order>, actor: Actor) -> Result<OrderDetails> {
        let order = order
            .filter(|o| actor.is_admin() || o.is_owned_by(actor.user_id))
            .ok_or(OrderError::NotFound("Order"))?;
        let (items, history) =
            tokio::try_join!(orders::items_for(&self.pool, order.id), orders::history_for(&self.pool, order.id))?;
        Ok(OrderDetails::new(order, items, history))
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: i64, page: Page) -> Result<OrderPage> {
        let (orders, total) = tokio::try_join!(
            queries::list_for_user(&self.pool, user_id, page),
            queries::count_for_user(&self.pool, user_id)
        )?;
        Ok(OrderPage { orders, total, limit: page.limit, offset: page.offset })
    }

    #[instrument(skip(self))]
    pub async fn admin_list(&self, filter: OrderFilter, page: Page) -> Result<OrderPage> {
        let (orders, total) =
            tokio::try_join!(queries::list_all(&self.pool, &filter, page), queries::count_all(&self.pool, &filter))?;
        info!(total, returned = orders.len(), "Orders listed");
        Ok(OrderPage { orders, total, limit: page.limit, offset: page.offset })
    }

    /// Per-user statistics, or global ones when `user_id` is `None`.
    #[instrument(skip(self))]
    pub async fn stats(&self, user_id: Option<i64>) -> Result<OrderStats> {
        let (totals, by_status) =
            tokio::try_join!(queries::totals(&self.pool, user_id), queries::status_counts(&self.pool, user_id))?;
        Ok(OrderStats { totals, by_status })
    }

    pub async fn user_overview(&self, user_id: i64, page: Page) -> Result<UserOverview> {
        let (page, stats) = tokio::try_join!(self.list_for_user(user_id, page), self.stats(Some(user_id)))?;
        Ok(UserOverview { user_id, page, stats })
    }
}

/// Explicit ids must belong to the user. Without a shipping id the default
/// (else oldest) address is used; billing falls back to shipping.
async fn resolve_addresses(
    conn: &mut PgConnection,
    user_id: i64,
    shipping_id: Option<i64>,
    billing_id: Option<i64>,
) -> Result<(ResolvedAddress, ResolvedAddress)> {
    let shipping = match shipping_id {
        Some(id) => catalog::find_address(&mut *conn, user_id, id).await?.ok_or(OrderError::NotFound("Shipping address"))?,
        None => catalog::default_address(&mut *conn, user_id).await?.ok_or_else(|| {
            warn!(user_id, "Checkout without any address on file");
            OrderError::AddressRequired
        })?,
    };
    let billing = match billing_id {
        Some(id) if id != shipping.id => {
            catalog::find_address(&mut *conn, user_id, id).await?.ok_or(OrderError::NotFound("Billing address"))?
        }
        _ => shipping.clone(),
    };
    Ok((shipping.into(), billing.into()))
}

/// Locks the coupon row, counts this user's prior uses when a per-user cap
/// exists, then evaluates.
async fn apply_coupon(
    conn: &mut PgConnection,
    code: &str,
    user_id: i64,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon> {
    let found = coupons::find_for_update(&mut *conn, code).await?;
    let prior_uses = match &found {
        Some(c) if c.limits_per_user() => coupons::count_usage(&mut *conn, c.id, user_id).await?,
        _ => 0,
    };
    coupon::evaluate(found.as_ref(), prior_uses, subtotal, now).map_err(|e| {
        warn!(code, error = %e, "Coupon rejected");
        OrderError::from(e)
    })
}
