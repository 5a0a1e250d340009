//! Outbound side effects: order events on NATS and customer confirmations.

use anyhow::Context;
use tracing::{debug, info};

use crate::domain::events::{OrderEvent, OrderNotification};

/// Publishes order events as JSON on one subject. Without a NATS client the
/// publisher is disabled and events are only logged.
#[derive(Clone)]
pub struct EventPublisher {
    client: Option<async_nats::Client>,
    subject: String,
}

impl EventPublisher {
    pub fn new(client: Option<async_nats::Client>, subject: impl Into<String>) -> Self {
        Self { client, subject: subject.into() }
    }

    pub fn disabled() -> Self { Self::new(None, "orders.events") }

    pub fn is_enabled(&self) -> bool { self.client.is_some() }

    pub async fn publish(&self, event: &OrderEvent) -> anyhow::Result<()> {
        let Some(client) = &self.client else {
            debug!(event = event.name(), "NATS not configured, event not published");
            return Ok(());
        };
        let payload = serde_json::to_vec(event).context("serialising order event")?;
        client
            .publish(self.subject.clone(), payload.into())
            .await
            .with_context(|| format!("publishing {} to {}", event.name(), self.subject))?;
        debug!(event = event.name(), subject = %self.subject, "event published");
        Ok(())
    }
}

/// Delivery of the confirmation itself belongs to the notification service;
/// this records the payload it would receive.
pub async fn send_confirmation(notification: &OrderNotification) -> anyhow::Result<()> {
    if notification.to.is_empty() {
        anyhow::bail!("no email address on file");
    }
    info!(
        to = %notification.to,
        order_number = %notification.order_number,
        total = %notification.total_amount,
        items = notification.items.len(),
        "order confirmation queued"
    );
    Ok(())
}
