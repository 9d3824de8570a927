//! Transactional invoice generation and regeneration.
//!
//! An invoice and its line items are created together, atomically. Any
//! failure rolls the whole transaction back, leaving the order's prior
//! state untouched so generation can be retried.

use crate::billing::{
    build_line_items, compute_totals, resolve_rate, revision_number, total_commission,
    CarpetBilling, OrderBilling, PricedAddon,
};
use crate::models::{
    AddonService, Agent, Carpet, CarpetType, Commission, CommissionType, DiscountType, Invoice,
    Order, OrderStatus, TaxSetting,
};
use crate::services::metrics::INVOICES_TOTAL;
use crate::services::Database;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

/// Source of globally unique invoice numbers. Injected so tests and
/// deployments can choose their own scheme.
pub trait InvoiceNumbering: Send + Sync {
    fn next_number(&self) -> String;
}

/// Default numbering: date plus a random suffix, e.g.
/// `INV-20260824-9F3A61D2`.
pub struct DateSequenceNumbering;

impl InvoiceNumbering for DateSequenceNumbering {
    fn next_number(&self) -> String {
        let today = Utc::now().date_naive();
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "INV-{:04}{:02}{:02}-{}",
            today.year(),
            today.month(),
            today.day(),
            suffix[..8].to_uppercase()
        )
    }
}

/// Parameters for invoice generation.
#[derive(Debug, Clone, Default)]
pub struct InvoiceParams {
    pub discount_value: Decimal,
    pub discount_type: Option<DiscountType>,
    pub tax_setting_id: Option<Uuid>,
    pub notes: Option<String>,
    /// Defaults to 14 days from issue.
    pub due_date: Option<NaiveDate>,
}

/// Generate an invoice for an order. All-or-nothing: the invoice, its
/// line items, the order-status side effect, and the agent commission
/// are one transaction.
#[instrument(skip(db, numbering, params), fields(order_id = %order_id))]
pub async fn generate_invoice(
    db: &Database,
    numbering: &dyn InvoiceNumbering,
    order_id: Uuid,
    params: &InvoiceParams,
) -> Result<Invoice, AppError> {
    let mut tx = db.pool().begin().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
    })?;

    let order = lock_order(&mut tx, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

    if active_invoice_exists(&mut tx, order_id).await? {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Order already has an active invoice"
        )));
    }

    let invoice_number = numbering.next_number();
    let invoice =
        generate_invoice_in_tx(&mut tx, &order, invoice_number, params, None, None).await?;

    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })?;

    INVOICES_TOTAL.with_label_values(&["pending"]).inc();
    info!(
        invoice_id = %invoice.invoice_id,
        invoice_number = %invoice.invoice_number,
        total = %invoice.total_amount,
        "Invoice generated"
    );

    Ok(invoice)
}

/// Supersede an issued invoice with a corrected one.
///
/// The old invoice is canceled and the replacement created in the same
/// transaction, so exactly one invoice per order stays active. The old
/// invoice's line items are never touched; the new invoice is a fully
/// independent row set numbered as a revision of the old number.
#[instrument(skip(db, params), fields(invoice_id = %old_invoice_id))]
pub async fn regenerate_invoice(
    db: &Database,
    old_invoice_id: Uuid,
    params: &InvoiceParams,
) -> Result<Invoice, AppError> {
    let mut tx = db.pool().begin().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
    })?;

    let old_invoice = lock_invoice(&mut tx, old_invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    if old_invoice.status == "canceled" {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invoice {} is already canceled",
            old_invoice.invoice_number
        )));
    }

    let order = lock_order(&mut tx, old_invoice.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

    let cancel_note = format!(
        "Superseded by regeneration on {}",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    );
    sqlx::query(
        r#"
        UPDATE invoices
        SET status = 'canceled',
            notes = CASE WHEN notes IS NULL OR notes = '' THEN $2
                         ELSE notes || E'\n' || $2 END
        WHERE invoice_id = $1
        "#,
    )
    .bind(old_invoice_id)
    .bind(&cancel_note)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel old invoice: {}", e)))?;

    let new_number = revision_number(&old_invoice.invoice_number);
    let invoice = generate_invoice_in_tx(
        &mut tx,
        &order,
        new_number,
        params,
        Some(old_invoice_id),
        Some(&old_invoice),
    )
    .await?;

    tx.commit().await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
    })?;

    INVOICES_TOTAL.with_label_values(&["canceled"]).inc();
    INVOICES_TOTAL.with_label_values(&["pending"]).inc();
    info!(
        old_invoice = %old_invoice.invoice_number,
        new_invoice = %invoice.invoice_number,
        "Invoice regenerated"
    );

    Ok(invoice)
}

/// Shared generation body. Validates references, computes totals,
/// materializes line items, applies the cleaned -> invoiced transition,
/// and creates the agent commission.
async fn generate_invoice_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
    invoice_number: String,
    params: &InvoiceParams,
    previous_invoice_id: Option<Uuid>,
    replaces: Option<&Invoice>,
) -> Result<Invoice, AppError> {
    let billing = load_order_billing(tx, order.order_id).await?;
    if billing.carpets.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Cannot invoice an order with no carpets"
        )));
    }

    let tax_setting = match params.tax_setting_id {
        Some(tax_setting_id) => Some(
            load_tax_setting(tx, tax_setting_id)
                .await?
                .ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "Tax setting {} does not exist",
                        tax_setting_id
                    ))
                })?,
        ),
        None => None,
    };

    let totals = compute_totals(
        &billing,
        params.discount_value,
        params.discount_type,
        tax_setting.as_ref(),
    );
    let line_items = build_line_items(&billing);

    let due_date = params
        .due_date
        .unwrap_or_else(|| Utc::now().date_naive() + chrono::Days::new(14));

    let notes = match replaces {
        Some(old) => {
            let system_note = format!(
                "Replaces invoice {} issued {}",
                old.invoice_number,
                old.issued_at.format("%Y-%m-%d")
            );
            match &params.notes {
                Some(user_notes) if !user_notes.is_empty() => {
                    Some(format!("{}\n{}", user_notes, system_note))
                }
                _ => Some(system_note),
            }
        }
        None => params.notes.clone(),
    };

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            invoice_id, order_id, invoice_number, status, subtotal,
            discount_value, discount_type, discount_amount, tax_setting_id,
            tax_amount, total_amount, notes, previous_invoice_id, issued_at, due_date
        )
        VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), $13)
        RETURNING invoice_id, order_id, invoice_number, status, subtotal,
            discount_value, discount_type, discount_amount, tax_setting_id,
            tax_amount, total_amount, notes, previous_invoice_id,
            issued_at, due_date, created_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order.order_id)
    .bind(&invoice_number)
    .bind(totals.subtotal)
    .bind(params.discount_value)
    .bind(params.discount_type.map(|d| d.as_str().to_string()))
    .bind(totals.discount_amount)
    .bind(params.tax_setting_id)
    .bind(totals.tax_amount)
    .bind(totals.total_amount)
    .bind(&notes)
    .bind(previous_invoice_id)
    .bind(due_date)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!(
                "Invoice number '{}' already exists",
                invoice_number
            ))
        }
        _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
    })?;

    for item in &line_items {
        sqlx::query(
            r#"
            INSERT INTO line_items (
                line_item_id, invoice_id, carpet_id, item_type, name, description,
                quantity, unit, unit_price, subtotal, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice.invoice_id)
        .bind(item.carpet_id)
        .bind(item.item_type.as_str())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit.as_str())
        .bind(item.unit_price)
        .bind(item.subtotal)
        .bind(item.sort_order)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create line item: {}", e)))?;
    }

    // Invoicing a cleaned order moves it forward; any other status is
    // left alone.
    if OrderStatus::from_string(&order.status) == OrderStatus::Cleaned {
        sqlx::query("UPDATE orders SET status = 'invoiced', updated_utc = NOW() WHERE order_id = $1")
            .bind(order.order_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update order status: {}", e))
            })?;
    }

    if let Some(agent_id) = order.agent_id {
        let agent = load_agent(tx, agent_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Agent {} does not exist", agent_id)))?;
        let commission_type = resolve_commission_type(tx, &agent).await?;
        insert_commission(tx, &agent, commission_type.as_ref(), &invoice).await?;
    }

    Ok(invoice)
}

/// Create the agent's commission for an invoice, idempotently.
///
/// The unique constraint on (agent_id, invoice_id) makes a duplicate
/// attempt a no-op: `Ok(None)` means the row already existed, which
/// callers treat as success so webhook redelivery cannot double-credit.
pub(crate) async fn insert_commission(
    tx: &mut Transaction<'_, Postgres>,
    agent: &Agent,
    commission_type: Option<&CommissionType>,
    invoice: &Invoice,
) -> Result<Option<Commission>, AppError> {
    let rate = resolve_rate(agent, commission_type);
    let total = total_commission(&rate, invoice.total_amount);

    let commission = sqlx::query_as::<_, Commission>(
        r#"
        INSERT INTO commissions (
            commission_id, agent_id, invoice_id, commission_type_id,
            fixed_amount, percentage_rate, total_commission, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
        ON CONFLICT (agent_id, invoice_id) DO NOTHING
        RETURNING commission_id, agent_id, invoice_id, commission_type_id,
            fixed_amount, percentage_rate, total_commission, status, paid_at, created_utc
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(agent.agent_id)
    .bind(invoice.invoice_id)
    .bind(rate.commission_type_id)
    .bind(rate.fixed_amount)
    .bind(rate.percentage_rate)
    .bind(total)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create commission: {}", e)))?;

    match &commission {
        Some(c) => {
            info!(
                commission_id = %c.commission_id,
                agent_id = %c.agent_id,
                total = %c.total_commission,
                "Commission created"
            );
        }
        None => {
            info!(
                agent_id = %agent.agent_id,
                invoice_id = %invoice.invoice_id,
                "Commission already exists, skipping"
            );
        }
    }

    Ok(commission)
}

/// The commission type in effect for an agent: the linked type, else the
/// business-wide default, else none (flat agent fields apply).
pub(crate) async fn resolve_commission_type(
    tx: &mut Transaction<'_, Postgres>,
    agent: &Agent,
) -> Result<Option<CommissionType>, AppError> {
    let query = match agent.commission_type_id {
        Some(commission_type_id) => sqlx::query_as::<_, CommissionType>(
            r#"
            SELECT commission_type_id, name, fixed_amount, percentage_rate, is_default, created_utc
            FROM commission_types
            WHERE commission_type_id = $1
            "#,
        )
        .bind(commission_type_id),
        None => sqlx::query_as::<_, CommissionType>(
            r#"
            SELECT commission_type_id, name, fixed_amount, percentage_rate, is_default, created_utc
            FROM commission_types
            WHERE is_default
            LIMIT 1
            "#,
        ),
    };

    query.fetch_optional(&mut **tx).await.map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to resolve commission type: {}", e))
    })
}

pub(crate) async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Option<Order>, AppError> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT order_id, client_id, agent_id, status, notes, created_utc, updated_utc
        FROM orders
        WHERE order_id = $1
        FOR UPDATE
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock order: {}", e)))
}

async fn lock_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
) -> Result<Option<Invoice>, AppError> {
    sqlx::query_as::<_, Invoice>(
        r#"
        SELECT invoice_id, order_id, invoice_number, status, subtotal,
            discount_value, discount_type, discount_amount, tax_setting_id,
            tax_amount, total_amount, notes, previous_invoice_id,
            issued_at, due_date, created_utc
        FROM invoices
        WHERE invoice_id = $1
        FOR UPDATE
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice: {}", e)))
}

async fn active_invoice_exists(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<bool, AppError> {
    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM invoices WHERE order_id = $1 AND status <> 'canceled' LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!("Failed to check active invoice: {}", e))
    })?;
    Ok(existing.is_some())
}

async fn load_tax_setting(
    tx: &mut Transaction<'_, Postgres>,
    tax_setting_id: Uuid,
) -> Result<Option<TaxSetting>, AppError> {
    sqlx::query_as::<_, TaxSetting>(
        r#"
        SELECT tax_setting_id, name, rate, calculation, active, created_utc
        FROM tax_settings
        WHERE tax_setting_id = $1
        "#,
    )
    .bind(tax_setting_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load tax setting: {}", e)))
}

pub(crate) async fn load_agent(
    tx: &mut Transaction<'_, Postgres>,
    agent_id: Uuid,
) -> Result<Option<Agent>, AppError> {
    sqlx::query_as::<_, Agent>(
        r#"
        SELECT agent_id, name, phone, email, commission_type_id,
            fixed_amount_override, percentage_rate_override,
            fixed_commission, percentage_commission, active, created_utc
        FROM agents
        WHERE agent_id = $1
        "#,
    )
    .bind(agent_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load agent: {}", e)))
}

#[derive(sqlx::FromRow)]
struct AddonRow {
    addon_service_id: Uuid,
    name: String,
    price: Decimal,
    is_per_square_foot: bool,
    active: bool,
    created_utc: DateTime<Utc>,
    price_override: Option<Decimal>,
}

/// Load the billable view of an order inside the generation
/// transaction, so the computation is atomic relative to concurrent
/// carpet edits.
async fn load_order_billing(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<OrderBilling, AppError> {
    let carpets = sqlx::query_as::<_, Carpet>(
        r#"
        SELECT carpet_id, order_id, carpet_type_id, scan_code, color,
            width, length, additional_charges, status, created_utc
        FROM carpets
        WHERE order_id = $1
        ORDER BY created_utc
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load carpets: {}", e)))?;

    let mut billing = OrderBilling::default();
    for carpet in carpets {
        let carpet_type = sqlx::query_as::<_, CarpetType>(
            r#"
            SELECT carpet_type_id, name, price, is_per_square_foot, active, created_utc
            FROM carpet_types
            WHERE carpet_type_id = $1
            "#,
        )
        .bind(carpet.carpet_type_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load carpet type: {}", e)))?
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Carpet {} references a missing carpet type",
                carpet.scan_code
            ))
        })?;

        let addon_rows = sqlx::query_as::<_, AddonRow>(
            r#"
            SELECT a.addon_service_id, a.name, a.price, a.is_per_square_foot,
                a.active, a.created_utc, ca.price_override
            FROM carpet_addons ca
            JOIN addon_services a ON a.addon_service_id = ca.addon_service_id
            WHERE ca.carpet_id = $1
            ORDER BY a.name
            "#,
        )
        .bind(carpet.carpet_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load addons: {}", e)))?;

        let addons = addon_rows
            .into_iter()
            .map(|row| PricedAddon {
                service: AddonService {
                    addon_service_id: row.addon_service_id,
                    name: row.name,
                    price: row.price,
                    is_per_square_foot: row.is_per_square_foot,
                    active: row.active,
                    created_utc: row.created_utc,
                },
                price_override: row.price_override,
            })
            .collect();

        billing.carpets.push(CarpetBilling {
            carpet,
            carpet_type,
            addons,
        });
    }

    Ok(billing)
}

#[cfg(test)]
mod tests {
    use super::{DateSequenceNumbering, InvoiceNumbering};

    #[test]
    fn generated_numbers_are_unique_and_prefixed() {
        let numbering = DateSequenceNumbering;
        let a = numbering.next_number();
        let b = numbering.next_number();
        assert!(a.starts_with("INV-"));
        assert_ne!(a, b);
    }
}
