//! Invoice and line item models for cleaning-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Canceled,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Canceled => "canceled",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => InvoiceStatus::Paid,
            "canceled" => InvoiceStatus::Canceled,
            "overdue" => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Pending,
        }
    }
}

/// Discount type applied to an invoice subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "fixed" => DiscountType::Fixed,
            _ => DiscountType::Percentage,
        }
    }
}

/// An issued invoice for an order. `previous_invoice_id` links the
/// revision chain produced by regeneration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub order_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub subtotal: Decimal,
    pub discount_value: Decimal,
    pub discount_type: Option<String>,
    pub discount_amount: Decimal,
    pub tax_setting_id: Option<Uuid>,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub previous_invoice_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

/// One priced row on an invoice, traceable to its originating
/// carpet/addon/charge.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub carpet_id: Option<Uuid>,
    pub item_type: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Line item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    CarpetBase,
    AddonService,
    Other,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::CarpetBase => "carpet_base",
            ItemType::AddonService => "addon_service",
            ItemType::Other => "other",
        }
    }
}

/// Billing unit of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    SqFt,
    Piece,
    Service,
    Charge,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::SqFt => "sq_ft",
            Unit::Piece => "piece",
            Unit::Service => "service",
            Unit::Charge => "charge",
        }
    }
}
