//! Invoice handlers: generation, regeneration, and reads.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    models::{DiscountType, Invoice, LineItem, Payment},
    services::invoicing::{self, InvoiceParams},
    AppState,
};

#[derive(Debug, Deserialize, Default)]
pub struct GenerateInvoiceRequest {
    #[serde(default)]
    pub discount_value: Decimal,
    pub discount_type: Option<DiscountType>,
    pub tax_setting_id: Option<Uuid>,
    pub notes: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesParams {
    pub order_id: Option<Uuid>,
    pub page_size: Option<i32>,
}

/// An invoice together with its line items.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub line_items: Vec<LineItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payments: Vec<Payment>,
}

impl GenerateInvoiceRequest {
    fn into_params(self) -> Result<InvoiceParams, AppError> {
        if self.discount_value < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount value must not be negative"
            )));
        }
        if self.discount_value > Decimal::ZERO && self.discount_type.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount type is required when a discount value is given"
            )));
        }
        Ok(InvoiceParams {
            discount_value: self.discount_value,
            discount_type: self.discount_type,
            tax_setting_id: self.tax_setting_id,
            notes: self.notes,
            due_date: self.due_date,
        })
    }
}

/// Generate an invoice for an order.
pub async fn generate_invoice(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let params = payload.into_params()?;
    let invoice =
        invoicing::generate_invoice(&state.db, state.numbering.as_ref(), order_id, &params).await?;
    let line_items = state.db.get_line_items(invoice.invoice_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse {
            invoice,
            line_items,
            payments: Vec::new(),
        }),
    ))
}

/// Cancel an invoice and issue a corrected replacement reflecting the
/// order's current state.
pub async fn regenerate_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let params = payload.into_params()?;
    let invoice = invoicing::regenerate_invoice(&state.db, invoice_id, &params).await?;
    let line_items = state.db.get_line_items(invoice.invoice_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse {
            invoice,
            line_items,
            payments: Vec::new(),
        }),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    let line_items = state.db.get_line_items(invoice_id).await?;
    let payments = state.db.list_payments_for_invoice(invoice_id).await?;

    Ok(Json(InvoiceResponse {
        invoice,
        line_items,
        payments,
    }))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<ListInvoicesParams>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = state
        .db
        .list_invoices(params.order_id, params.page_size.unwrap_or(50))
        .await?;

    Ok(Json(invoices))
}
