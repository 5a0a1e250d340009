//! Order status state machine.
//!
//! Three commands drive an order: the owner's `Cancel`, the table-constrained
//! `Advance` used by vendors and admins, and the admin-only `Override` that
//! may set any status on an order that is not cancelled. [`authorize`]
//! decides who may issue a command; [`plan_transition`] decides what the
//! command does to an order in a given status. The plan is applied by the
//! persistence layer in one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{FulfillmentStatus, OrderStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

/// The authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}

/// Carrier details that may accompany a move to `shipped`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusCommand {
    Cancel { reason: Option<String> },
    Advance { to: OrderStatus, notes: Option<String>, shipment: Shipment },
    Override { to: OrderStatus, notes: Option<String>, shipment: Shipment },
}

impl StatusCommand {
    pub fn target(&self) -> OrderStatus {
        match self {
            Self::Cancel { .. } => OrderStatus::Cancelled,
            Self::Advance { to, .. } | Self::Override { to, .. } => *to,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            Self::Cancel { reason } => reason.as_deref(),
            Self::Advance { notes, .. } | Self::Override { notes, .. } => notes.as_deref(),
        }
    }

    fn shipment(&self) -> Option<&Shipment> {
        match self {
            Self::Cancel { .. } => None,
            Self::Advance { shipment, .. } | Self::Override { shipment, .. } => Some(shipment),
        }
    }
}

/// Forward transitions available to vendors and admins through `Advance`.
pub fn allowed_targets(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Processing, Cancelled],
        Processing => &[Packed, Cancelled],
        Packed => &[Shipped],
        Shipped => &[OutForDelivery],
        OutForDelivery => &[Delivered],
        Delivered | Cancelled | Refunded => &[],
    }
}

pub fn can_advance(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_targets(from).contains(&to)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyDenial {
    #[error("Only the customer who placed this order can cancel it")]
    NotOwner,
    #[error("Access denied")]
    RoleNotPermitted,
}

/// The role half of [`authorize`]; needs no order, so it can run before
/// anything is loaded.
pub fn authorize_role(actor: &Actor, command: &StatusCommand) -> Result<(), PolicyDenial> {
    match command {
        StatusCommand::Cancel { .. } => Ok(()),
        StatusCommand::Advance { .. } if matches!(actor.role, Role::Vendor | Role::Admin) => Ok(()),
        StatusCommand::Override { .. } if actor.role == Role::Admin => Ok(()),
        StatusCommand::Advance { .. } | StatusCommand::Override { .. } => Err(PolicyDenial::RoleNotPermitted),
    }
}

/// Who may issue which command. `order_owner` is the order's `user_id`.
pub fn authorize(actor: &Actor, command: &StatusCommand, order_owner: Option<i64>) -> Result<(), PolicyDenial> {
    authorize_role(actor, command)?;
    match command {
        StatusCommand::Cancel { .. } if order_owner != Some(actor.user_id) => Err(PolicyDenial::NotOwner),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot transition from '{from}' to '{to}'")]
pub struct IllegalTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Column changes that accompany a status change. `None` leaves a column as is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusEffects {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
    pub cancellation_reason: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub restore_stock: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_by: i64,
    pub notes: Option<String>,
    pub effects: StatusEffects,
}

/// Validates `command` against the order's current status and derives the
/// column changes plus the history row to append.
pub fn plan_transition(
    current: OrderStatus,
    command: &StatusCommand,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, IllegalTransition> {
    let to = command.target();
    let legal = match command {
        StatusCommand::Cancel { .. } => current.is_customer_cancellable(),
        StatusCommand::Advance { .. } => can_advance(current, to),
        // A cancelled order has already given its stock back.
        StatusCommand::Override { .. } => current != to && current != OrderStatus::Cancelled,
    };
    if !legal {
        return Err(IllegalTransition { from: current, to });
    }

    let notes = command.notes().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
    let mut effects = StatusEffects::default();
    match to {
        OrderStatus::Confirmed => effects.confirmed_at = Some(now),
        OrderStatus::Shipped => {
            effects.shipped_at = Some(now);
            if let Some(shipment) = command.shipment() {
                effects.tracking_number = shipment.tracking_number.clone();
                effects.carrier = shipment.carrier.clone();
            }
        }
        OrderStatus::Delivered => {
            effects.delivered_at = Some(now);
            effects.fulfillment_status = Some(FulfillmentStatus::Fulfilled);
        }
        OrderStatus::Cancelled => {
            effects.cancelled_at = Some(now);
            effects.cancelled_by = Some(actor.user_id);
            effects.cancellation_reason = notes.clone();
            effects.restore_stock = true;
        }
        _ => {}
    }

    Ok(TransitionPlan { from: current, to, changed_by: actor.user_id, notes, effects })
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const CUSTOMER: Actor = Actor { user_id: 7, role: Role::Customer };
    const VENDOR: Actor = Actor { user_id: 20, role: Role::Vendor };
    const ADMIN: Actor = Actor { user_id: 1, role: Role::Admin };

    fn advance(to: OrderStatus) -> StatusCommand {
        StatusCommand::Advance { to, notes: None, shipment: Shipment::default() }
    }

    fn override_to(to: OrderStatus) -> StatusCommand {
        StatusCommand::Override { to, notes: Some("manual fix".into()), shipment: Shipment::default() }
    }

    #[test]
    fn test_forward_table() {
        assert!(can_advance(Pending, Confirmed));
        assert!(can_advance(Processing, Cancelled));
        assert!(can_advance(OutForDelivery, Delivered));
        assert!(!can_advance(Pending, Shipped));
        assert!(!can_advance(Packed, Cancelled));
        assert!(!can_advance(Shipped, Packed));
        for terminal in [Delivered, Cancelled, Refunded] {
            assert!(allowed_targets(terminal).is_empty());
        }
        assert!(OrderStatus::ALL.iter().all(|s| !can_advance(*s, Refunded)));
    }

    #[test]
    fn test_every_table_transition_plans() {
        for from in OrderStatus::ALL {
            for to in allowed_targets(*from) {
                let plan = plan_transition(*from, &advance(*to), &VENDOR, Utc::now()).unwrap();
                assert_eq!((plan.from, plan.to), (*from, *to));
            }
        }
    }

    #[test]
    fn test_pending_to_shipped_is_illegal_for_vendor() {
        let err = plan_transition(Pending, &advance(Shipped), &VENDOR, Utc::now()).unwrap_err();
        assert_eq!(err, IllegalTransition { from: Pending, to: Shipped });
        assert_eq!(err.to_string(), "Cannot transition from 'pending' to 'shipped'");
    }

    #[test]
    fn test_override_accepts_any_other_status() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let result = plan_transition(*from, &override_to(*to), &ADMIN, Utc::now());
                assert_eq!(result.is_ok(), from != to && *from != Cancelled, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_cancelled_order_cannot_be_reopened() {
        let cancel = StatusCommand::Cancel { reason: None };
        let first = plan_transition(Pending, &cancel, &CUSTOMER, Utc::now()).unwrap();
        assert!(first.effects.restore_stock);

        for to in [Pending, Confirmed, Refunded] {
            let err = plan_transition(Cancelled, &override_to(to), &ADMIN, Utc::now()).unwrap_err();
            assert_eq!(err, IllegalTransition { from: Cancelled, to });
        }
    }

    #[test]
    fn test_customer_cancel_window() {
        let cancel = StatusCommand::Cancel { reason: Some("changed my mind".into()) };
        assert!(plan_transition(Pending, &cancel, &CUSTOMER, Utc::now()).is_ok());
        assert!(plan_transition(Confirmed, &cancel, &CUSTOMER, Utc::now()).is_ok());
        assert!(plan_transition(Processing, &cancel, &CUSTOMER, Utc::now()).is_err());
        assert!(plan_transition(Cancelled, &cancel, &CUSTOMER, Utc::now()).is_err());
    }

    #[test]
    fn test_cancel_effects() {
        let now = Utc::now();
        let cancel = StatusCommand::Cancel { reason: Some(" too slow ".into()) };
        let plan = plan_transition(Confirmed, &cancel, &CUSTOMER, now).unwrap();
        assert_eq!(plan.from, Confirmed);
        assert_eq!(plan.to, Cancelled);
        assert_eq!(plan.changed_by, 7);
        assert_eq!(plan.notes.as_deref(), Some("too slow"));
        assert!(plan.effects.restore_stock);
        assert_eq!(plan.effects.cancelled_at, Some(now));
        assert_eq!(plan.effects.cancelled_by, Some(7));
        assert_eq!(plan.effects.cancellation_reason.as_deref(), Some("too slow"));
    }

    #[test]
    fn test_timestamp_effects() {
        let now = Utc::now();
        let confirmed = plan_transition(Pending, &advance(Confirmed), &VENDOR, now).unwrap();
        assert_eq!(confirmed.effects, StatusEffects { confirmed_at: Some(now), ..Default::default() });

        let shipment = Shipment { tracking_number: Some("TRK1".into()), carrier: Some("BlueDart".into()) };
        let shipped = plan_transition(Packed, &StatusCommand::Advance { to: Shipped, notes: None, shipment }, &VENDOR, now).unwrap();
        assert_eq!(shipped.effects.shipped_at, Some(now));
        assert_eq!(shipped.effects.tracking_number.as_deref(), Some("TRK1"));
        assert!(!shipped.effects.restore_stock);

        let delivered = plan_transition(OutForDelivery, &advance(Delivered), &VENDOR, now).unwrap();
        assert_eq!(delivered.effects.delivered_at, Some(now));
        assert_eq!(delivered.effects.fulfillment_status, Some(FulfillmentStatus::Fulfilled));

        let packed = plan_transition(Processing, &advance(Packed), &VENDOR, now).unwrap();
        assert_eq!(packed.effects, StatusEffects::default());
    }

    #[test]
    fn test_admin_override_to_cancelled_restores_stock() {
        let plan = plan_transition(Shipped, &override_to(Cancelled), &ADMIN, Utc::now()).unwrap();
        assert!(plan.effects.restore_stock);
        assert_eq!(plan.effects.cancelled_by, Some(1));
        assert_eq!(plan.notes.as_deref(), Some("manual fix"));
    }

    #[test]
    fn test_policy() {
        let cancel = StatusCommand::Cancel { reason: None };
        assert_eq!(authorize(&CUSTOMER, &cancel, Some(7)), Ok(()));
        assert_eq!(authorize(&CUSTOMER, &cancel, Some(8)), Err(PolicyDenial::NotOwner));
        assert_eq!(authorize(&ADMIN, &cancel, Some(7)), Err(PolicyDenial::NotOwner));
        assert_eq!(authorize(&CUSTOMER, &cancel, None), Err(PolicyDenial::NotOwner));

        assert_eq!(authorize(&CUSTOMER, &advance(Confirmed), Some(7)), Err(PolicyDenial::RoleNotPermitted));
        assert_eq!(authorize(&VENDOR, &advance(Confirmed), None), Ok(()));
        assert_eq!(authorize(&ADMIN, &advance(Confirmed), None), Ok(()));

        assert_eq!(authorize(&VENDOR, &override_to(Refunded), None), Err(PolicyDenial::RoleNotPermitted));
        assert_eq!(authorize(&ADMIN, &override_to(Refunded), None), Ok(()));
    }

    #[test]
    fn test_role_check_ignores_ownership() {
        let cancel = StatusCommand::Cancel { reason: None };
        assert_eq!(authorize_role(&VENDOR, &cancel), Ok(()));
        assert_eq!(authorize_role(&CUSTOMER, &advance(Packed)), Err(PolicyDenial::RoleNotPermitted));
        assert_eq!(authorize_role(&VENDOR, &override_to(Packed)), Err(PolicyDenial::RoleNotPermitted));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Customer);
        assert!("superuser".parse::<Role>().is_err());
    }
}
