//! Carpet type and addon service catalog models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A priced carpet category. Per-square-foot types multiply price by the
/// carpet's area; flat types charge the price once per carpet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CarpetType {
    pub carpet_type_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_per_square_foot: bool,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a carpet type.
#[derive(Debug, Clone)]
pub struct CreateCarpetType {
    pub name: String,
    pub price: Decimal,
    pub is_per_square_foot: bool,
}

/// An optional supplementary service attachable to a carpet, priced
/// independently of the carpet's own pricing mode.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AddonService {
    pub addon_service_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_per_square_foot: bool,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an addon service.
#[derive(Debug, Clone)]
pub struct CreateAddonService {
    pub name: String,
    pub price: Decimal,
    pub is_per_square_foot: bool,
}
