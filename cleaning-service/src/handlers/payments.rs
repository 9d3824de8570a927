//! Payment handlers, including the gateway webhook.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    models::Payment,
    services::payments,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// "online" collects through the gateway; anything else ("cash",
    /// "bank_transfer") records a manual payment.
    #[serde(default = "default_method")]
    pub method: String,
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
}

fn default_method() -> String {
    "online".to_string()
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    #[serde(flatten)]
    pub payment: Payment,
    /// Hosted payment page, present for online payments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

pub async fn create_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), AppError> {
    let created = payments::create_payment(
        &state.db,
        &state.gateway,
        invoice_id,
        &payload.method,
        payload.payer_name,
        payload.payer_email,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            payment: created.payment,
            payment_url: created.payment_url,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    #[serde(flatten)]
    pub payment: Payment,
    /// The gateway's current view of the bill, when one exists and the
    /// gateway is reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_state: Option<String>,
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    let gateway_state = match &payment.bill_code {
        Some(bill_code) if state.gateway.is_configured() => {
            match state.gateway.get_bill(bill_code).await {
                Ok(bill) => Some(bill.state),
                Err(e) => {
                    tracing::warn!(error = %e, bill_code = %bill_code, "Gateway status lookup failed");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(Json(PaymentStatusResponse {
        payment,
        gateway_state,
    }))
}

/// Settle a manual payment (cash or bank transfer received by staff).
pub async fn complete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = payments::complete_payment(&state.db, payment_id).await?;
    Ok(Json(payment))
}

/// Gateway webhook handler.
///
/// Verifies the callback signature before acting on the event. Paid
/// bills settle the matching payment; failed bills mark it failed.
/// Redelivery is harmless: settlement is idempotent.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("X-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing X-Signature header");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    if !state.gateway.verify_webhook_signature(&body, signature)? {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event = state
        .gateway
        .parse_webhook_event(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed webhook payload: {}", e)))?;

    tracing::info!(bill_code = %event.id, state = %event.state, "Webhook event received");

    if event.paid || event.state == "paid" {
        payments::complete_payment_by_bill(&state.db, &event.id).await?;
    } else if event.state == "failed" {
        payments::fail_payment_by_bill(&state.db, &event.id).await?;
    } else {
        tracing::debug!(state = %event.state, "Ignoring webhook event state");
    }

    Ok(StatusCode::OK)
}
