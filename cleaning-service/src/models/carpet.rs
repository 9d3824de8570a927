//! Carpet model for cleaning-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Carpet status. `Canceled` is terminal: the carpet stays visible on
/// invoices for audit but its billable contribution is zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarpetStatus {
    Received,
    InCleaning,
    Cleaned,
    Delivered,
    Canceled,
}

impl CarpetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarpetStatus::Received => "received",
            CarpetStatus::InCleaning => "in_cleaning",
            CarpetStatus::Cleaned => "cleaned",
            CarpetStatus::Delivered => "delivered",
            CarpetStatus::Canceled => "canceled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "in_cleaning" => CarpetStatus::InCleaning,
            "cleaned" => CarpetStatus::Cleaned,
            "delivered" => CarpetStatus::Delivered,
            "canceled" => CarpetStatus::Canceled,
            _ => CarpetStatus::Received,
        }
    }
}

/// A single carpet within an order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Carpet {
    pub carpet_id: Uuid,
    pub order_id: Uuid,
    pub carpet_type_id: Uuid,
    pub scan_code: String,
    pub color: Option<String>,
    /// Feet; may be null before measurement.
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
    /// Flat surcharge on top of base and addon pricing.
    pub additional_charges: Decimal,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}

impl Carpet {
    pub fn is_canceled(&self) -> bool {
        CarpetStatus::from_string(&self.status) == CarpetStatus::Canceled
    }
}

/// Input for adding a carpet to an order.
#[derive(Debug, Clone)]
pub struct CreateCarpet {
    pub order_id: Uuid,
    pub carpet_type_id: Uuid,
    pub scan_code: String,
    pub color: Option<String>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
    pub additional_charges: Decimal,
}

/// An addon service attached to a carpet, with an optional price override
/// that replaces the computed price entirely.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CarpetAddon {
    pub carpet_id: Uuid,
    pub addon_service_id: Uuid,
    pub price_override: Option<Decimal>,
}
