//! Agent and commission type models for cleaning-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A field agent who brings in orders and earns commissions.
///
/// Commission rates resolve in tiers: agent-specific overrides on the
/// commission-type association first, then the commission type's base
/// rates, then the agent's own flat fields when no type is linked.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    pub agent_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub commission_type_id: Option<Uuid>,
    /// Agent-specific override of the commission type's fixed amount.
    pub fixed_amount_override: Option<Decimal>,
    /// Agent-specific override of the commission type's percentage rate.
    pub percentage_rate_override: Option<Decimal>,
    /// Flat fallback used when no commission type is linked.
    pub fixed_commission: Option<Decimal>,
    pub percentage_commission: Option<Decimal>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an agent.
#[derive(Debug, Clone)]
pub struct CreateAgent {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub commission_type_id: Option<Uuid>,
    pub fixed_amount_override: Option<Decimal>,
    pub percentage_rate_override: Option<Decimal>,
    pub fixed_commission: Option<Decimal>,
    pub percentage_commission: Option<Decimal>,
}

/// A named commission scheme (fixed amount plus percentage of total).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommissionType {
    pub commission_type_id: Uuid,
    pub name: String,
    pub fixed_amount: Decimal,
    pub percentage_rate: Decimal,
    /// At most one commission type carries the default flag.
    pub is_default: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a commission type.
#[derive(Debug, Clone)]
pub struct CreateCommissionType {
    pub name: String,
    pub fixed_amount: Decimal,
    pub percentage_rate: Decimal,
    pub is_default: bool,
}
