//! Commission model for cleaning-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Commission status. Paid and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => CommissionStatus::Paid,
            "cancelled" => CommissionStatus::Cancelled,
            _ => CommissionStatus::Pending,
        }
    }
}

/// An agent payout derived from an invoice. One row per (agent, invoice),
/// enforced by a unique constraint so duplicate triggers cannot
/// double-credit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Commission {
    pub commission_id: Uuid,
    pub agent_id: Uuid,
    pub invoice_id: Uuid,
    pub commission_type_id: Option<Uuid>,
    pub fixed_amount: Decimal,
    pub percentage_rate: Decimal,
    pub total_commission: Decimal,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}
