//! Order model for cleaning-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Order workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    PickedUp,
    InCleaning,
    Cleaned,
    Invoiced,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::InCleaning => "in_cleaning",
            OrderStatus::Cleaned => "cleaned",
            OrderStatus::Invoiced => "invoiced",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "assigned" => OrderStatus::Assigned,
            "picked_up" => OrderStatus::PickedUp,
            "in_cleaning" => OrderStatus::InCleaning,
            "cleaned" => OrderStatus::Cleaned,
            "invoiced" => OrderStatus::Invoiced,
            "delivered" => OrderStatus::Delivered,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Pending,
        }
    }

    /// Forward transitions allowed from this status. Cancellation is
    /// allowed from any non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if matches!(self, Completed | Cancelled) {
            return false;
        }
        if next == Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Assigned, PickedUp)
                | (PickedUp, InCleaning)
                | (InCleaning, Cleaned)
                | (Cleaned, Invoiced)
                | (Invoiced, Delivered)
                | (Delivered, Completed)
        )
    }
}

/// A cleaning order, owning its carpets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub client_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub status: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub client_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn workflow_moves_forward_one_step_at_a_time() {
        assert!(OrderStatus::Cleaned.can_transition_to(OrderStatus::Invoiced));
        assert!(!OrderStatus::Cleaned.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Invoiced.can_transition_to(OrderStatus::Cleaned));
    }

    #[test]
    fn cancellation_allowed_from_any_open_state() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Invoiced.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
    }
}
