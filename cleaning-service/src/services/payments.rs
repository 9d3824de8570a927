//! Payment collection and settlement.
//!
//! Online payments create a bill with the external gateway and complete
//! when the webhook callback arrives; manual payments (cash, bank
//! transfer) are recorded directly and completed by staff. Settlement is
//! transactional and idempotent, so webhook redelivery is harmless.

use crate::models::{Invoice, InvoiceStatus, Payment, PaymentStatus};
use crate::services::invoicing::{insert_commission, load_agent, lock_order, resolve_commission_type};
use crate::services::metrics::{INVOICES_TOTAL, PAYMENTS_TOTAL};
use crate::services::{Database, GatewayClient};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A created payment together with the gateway's hosted payment page,
/// when one exists.
#[derive(Debug)]
pub struct CreatedPayment {
    pub payment: Payment,
    pub payment_url: Option<String>,
}

/// Create a payment against an invoice.
///
/// For the "online" method a bill is created with the gateway first and
/// its code stored on the payment row; other methods record a pending
/// payment to be completed by staff.
#[instrument(skip(db, gateway), fields(invoice_id = %invoice_id, method = %method))]
pub async fn create_payment(
    db: &Database,
    gateway: &GatewayClient,
    invoice_id: Uuid,
    method: &str,
    payer_name: Option<String>,
    payer_email: Option<String>,
) -> Result<CreatedPayment, AppError> {
    let invoice = db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    match InvoiceStatus::from_string(&invoice.status) {
        InvoiceStatus::Pending | InvoiceStatus::Overdue => {}
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice {} is {}, cannot collect payment",
                invoice.invoice_number,
                invoice.status
            )));
        }
    }

    let (bill_code, payment_url) = if method == "online" {
        let amount_cents = to_cents(invoice.total_amount)?;
        let bill = gateway
            .create_bill(
                amount_cents,
                &format!("Carpet cleaning invoice {}", invoice.invoice_number),
                Some(invoice.invoice_number.clone()),
                payer_name,
                payer_email,
            )
            .await
            .map_err(|e| AppError::BadGateway(format!("Bill creation failed: {}", e)))?;
        (Some(bill.id), bill.url)
    } else {
        (None, None)
    };

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (payment_id, invoice_id, amount, method, status, bill_code)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        RETURNING payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(invoice.invoice_id)
    .bind(invoice.total_amount)
    .bind(method)
    .bind(&bill_code)
    .fetch_one(db.pool())
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("Bill code already recorded"))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create payment: {}", e)),
    })?;

    PAYMENTS_TOTAL.with_label_values(&[method]).inc();
    info!(
        payment_id = %payment.payment_id,
        amount = %payment.amount,
        "Payment created"
    );

    Ok(CreatedPayment {
        payment,
        payment_url,
    })
}

/// Settle the payment identified by a gateway bill code. This is the
/// webhook path; redelivered events find the payment already completed
/// and return it unchanged.
#[instrument(skip(db), fields(bill_code = %bill_code))]
pub async fn complete_payment_by_bill(db: &Database, bill_code: &str) -> Result<Payment, AppError> {
    let mut tx = begin(db).await?;

    let payment = lock_payment_by_bill(&mut tx, bill_code)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("No payment for bill code {}", bill_code))
        })?;

    let payment = settle(&mut tx, payment).await?;

    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })?;
    Ok(payment)
}

/// Settle a manual payment (cash or bank transfer) by id.
#[instrument(skip(db), fields(payment_id = %payment_id))]
pub async fn complete_payment(db: &Database, payment_id: Uuid) -> Result<Payment, AppError> {
    let mut tx = begin(db).await?;

    let payment = lock_payment(&mut tx, payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    let payment = settle(&mut tx, payment).await?;

    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })?;
    Ok(payment)
}

/// Mark the payment for a bill as failed. Completed payments are left
/// untouched; a failure event arriving after settlement is stale.
#[instrument(skip(db), fields(bill_code = %bill_code))]
pub async fn fail_payment_by_bill(db: &Database, bill_code: &str) -> Result<Payment, AppError> {
    let mut tx = begin(db).await?;

    let payment = lock_payment_by_bill(&mut tx, bill_code)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("No payment for bill code {}", bill_code))
        })?;

    if PaymentStatus::from_string(&payment.status) == PaymentStatus::Completed {
        warn!(payment_id = %payment.payment_id, "Ignoring failure event for settled payment");
        return Ok(payment);
    }

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET status = 'failed'
        WHERE payment_id = $1
        RETURNING payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
        "#,
    )
    .bind(payment.payment_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to fail payment: {}", e)))?;

    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })?;

    info!(payment_id = %payment.payment_id, "Payment marked failed");
    Ok(payment)
}

/// Shared settlement body: completes the payment, marks the invoice
/// paid, and credits the agent commission. Already-completed payments
/// short-circuit, making the whole path idempotent.
async fn settle(
    tx: &mut Transaction<'_, Postgres>,
    payment: Payment,
) -> Result<Payment, AppError> {
    if PaymentStatus::from_string(&payment.status) == PaymentStatus::Completed {
        info!(payment_id = %payment.payment_id, "Payment already settled, skipping");
        return Ok(payment);
    }
    if PaymentStatus::from_string(&payment.status) == PaymentStatus::Cancelled {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment has been cancelled"
        )));
    }

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        UPDATE payments
        SET status = 'completed', paid_at = NOW()
        WHERE payment_id = $1
        RETURNING payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
        "#,
    )
    .bind(payment.payment_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to complete payment: {}", e)))?;

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices
        SET status = 'paid'
        WHERE invoice_id = $1 AND status <> 'canceled'
        RETURNING invoice_id, order_id, invoice_number, status, subtotal,
            discount_value, discount_type, discount_amount, tax_setting_id,
            tax_amount, total_amount, notes, previous_invoice_id,
            issued_at, due_date, created_utc
        "#,
    )
    .bind(payment.invoice_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to mark invoice paid: {}", e)))?
    .ok_or_else(|| {
        AppError::Conflict(anyhow::anyhow!(
            "Invoice has been canceled, payment cannot settle against it"
        ))
    })?;

    let order = lock_order(tx, invoice.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

    if let Some(agent_id) = order.agent_id {
        if let Some(agent) = load_agent(tx, agent_id).await? {
            let commission_type = resolve_commission_type(tx, &agent).await?;
            insert_commission(tx, &agent, commission_type.as_ref(), &invoice).await?;
        }
    }

    INVOICES_TOTAL.with_label_values(&["paid"]).inc();
    info!(
        payment_id = %payment.payment_id,
        invoice_number = %invoice.invoice_number,
        "Payment settled"
    );

    Ok(payment)
}

fn to_cents(amount: Decimal) -> Result<i64, AppError> {
    (crate::billing::round_currency(amount) * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Amount out of range")))
}

async fn begin(db: &Database) -> Result<Transaction<'static, Postgres>, AppError> {
    db.pool().begin().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
    })
}

async fn lock_payment(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
) -> Result<Option<Payment>, AppError> {
    sqlx::query_as::<_, Payment>(
        r#"
        SELECT payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
        FROM payments
        WHERE payment_id = $1
        FOR UPDATE
        "#,
    )
    .bind(payment_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock payment: {}", e)))
}

async fn lock_payment_by_bill(
    tx: &mut Transaction<'_, Postgres>,
    bill_code: &str,
) -> Result<Option<Payment>, AppError> {
    sqlx::query_as::<_, Payment>(
        r#"
        SELECT payment_id, invoice_id, amount, method, status, bill_code, paid_at, created_utc
        FROM payments
        WHERE bill_code = $1
        FOR UPDATE
        "#,
    )
    .bind(bill_code)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock payment: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::to_cents;
    use rust_decimal_macros::dec;

    #[test]
    fn cents_conversion_rounds_to_whole_cents() {
        assert_eq!(to_cents(dec!(286.20)).unwrap(), 28620);
        assert_eq!(to_cents(dec!(0.005)).unwrap(), 1);
        assert_eq!(to_cents(dec!(100)).unwrap(), 10000);
    }
}
