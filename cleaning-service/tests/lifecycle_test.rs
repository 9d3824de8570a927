//! Database-backed lifecycle tests: invoice regeneration, commission
//! idempotency, and the single-default commission type rule.
//!
//! Each test runs against its own freshly migrated database.

use cleaning_service::config::GatewayConfig;
use cleaning_service::models::{
    CreateAgent, CreateCarpet, CreateCarpetType, CreateCommissionType, CreateOrder,
};
use cleaning_service::services::invoicing::{
    generate_invoice, regenerate_invoice, DateSequenceNumbering, InvoiceParams,
};
use cleaning_service::services::{payments, Database, GatewayClient};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::Secret;
use sqlx::PgPool;
use uuid::Uuid;

/// A gateway client with no credentials; manual payment paths never
/// call out to it.
fn test_gateway() -> GatewayClient {
    GatewayClient::new(GatewayConfig {
        api_base_url: "http://localhost:0".to_string(),
        api_key: Secret::new(String::new()),
        webhook_secret: Secret::new(String::new()),
        collection_id: String::new(),
    })
}

/// Create an agent with flat commission fields and an order assigned to
/// them, carrying one measured wool carpet.
async fn order_with_agent(db: &Database) -> (Uuid, Uuid) {
    let agent = db
        .create_agent(&CreateAgent {
            name: "Amina".to_string(),
            phone: None,
            email: None,
            commission_type_id: None,
            fixed_amount_override: None,
            percentage_rate_override: None,
            fixed_commission: Some(dec!(5)),
            percentage_commission: Some(dec!(6)),
        })
        .await
        .expect("Failed to create agent");

    let order = db
        .create_order(&CreateOrder {
            client_id: None,
            agent_id: Some(agent.agent_id),
            notes: None,
        })
        .await
        .expect("Failed to create order");

    let carpet_type = db
        .create_carpet_type(&CreateCarpetType {
            name: "Wool".to_string(),
            price: dec!(4.50),
            is_per_square_foot: true,
        })
        .await
        .expect("Failed to create carpet type");

    db.add_carpet(&CreateCarpet {
        order_id: order.order_id,
        carpet_type_id: carpet_type.carpet_type_id,
        scan_code: "C-1001".to_string(),
        color: None,
        width: Some(dec!(8)),
        length: Some(dec!(10)),
        additional_charges: Decimal::ZERO,
    })
    .await
    .expect("Failed to add carpet");

    (agent.agent_id, order.order_id)
}

#[sqlx::test(migrations = "./migrations")]
async fn settlement_after_generation_leaves_a_single_commission(pool: PgPool) {
    let db = Database::from_pool(pool);
    let (agent_id, order_id) = order_with_agent(&db).await;

    let invoice = generate_invoice(
        &db,
        &DateSequenceNumbering,
        order_id,
        &InvoiceParams::default(),
    )
    .await
    .expect("Failed to generate invoice");

    // Generation credits the agent once: 5 fixed + 6% of 360.00.
    let commissions = db
        .list_commissions_for_agent(agent_id, 10)
        .await
        .expect("Failed to list commissions");
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].invoice_id, invoice.invoice_id);
    assert_eq!(commissions[0].total_commission, dec!(26.60));

    // Settling the invoice triggers the same credit again; the second
    // attempt must be a no-op.
    let created = payments::create_payment(
        &db,
        &test_gateway(),
        invoice.invoice_id,
        "cash",
        None,
        None,
    )
    .await
    .expect("Failed to create payment");

    payments::complete_payment(&db, created.payment.payment_id)
        .await
        .expect("Failed to complete payment");
    // Redelivered completion is equally harmless.
    payments::complete_payment(&db, created.payment.payment_id)
        .await
        .expect("Failed to complete payment twice");

    let commissions = db
        .list_commissions_for_agent(agent_id, 10)
        .await
        .expect("Failed to list commissions");
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].total_commission, dec!(26.60));

    let invoice = db
        .get_invoice(invoice.invoice_id)
        .await
        .expect("Failed to get invoice")
        .expect("Invoice missing");
    assert_eq!(invoice.status, "paid");
}

#[sqlx::test(migrations = "./migrations")]
async fn regeneration_cancels_the_old_invoice_and_keeps_its_line_items(pool: PgPool) {
    let db = Database::from_pool(pool);
    let (_, order_id) = order_with_agent(&db).await;

    let old_invoice = generate_invoice(
        &db,
        &DateSequenceNumbering,
        order_id,
        &InvoiceParams::default(),
    )
    .await
    .expect("Failed to generate invoice");

    let old_items = db
        .get_line_items(old_invoice.invoice_id)
        .await
        .expect("Failed to get line items");
    assert!(!old_items.is_empty());

    let new_invoice = regenerate_invoice(&db, old_invoice.invoice_id, &InvoiceParams::default())
        .await
        .expect("Failed to regenerate invoice");

    // Old invoice is canceled with an audit note, its line items frozen.
    let old_after = db
        .get_invoice(old_invoice.invoice_id)
        .await
        .expect("Failed to get invoice")
        .expect("Invoice missing");
    assert_eq!(old_after.status, "canceled");
    assert!(old_after
        .notes
        .as_deref()
        .unwrap_or_default()
        .contains("Superseded by regeneration"));

    let old_items_after = db
        .get_line_items(old_invoice.invoice_id)
        .await
        .expect("Failed to get line items");
    assert_eq!(
        old_items
            .iter()
            .map(|i| (i.line_item_id, i.subtotal))
            .collect::<Vec<_>>(),
        old_items_after
            .iter()
            .map(|i| (i.line_item_id, i.subtotal))
            .collect::<Vec<_>>()
    );

    // The replacement is an independent row set chained to the old one.
    assert_eq!(new_invoice.previous_invoice_id, Some(old_invoice.invoice_id));
    assert_eq!(
        new_invoice.invoice_number,
        format!("{}-R1", old_invoice.invoice_number)
    );

    let new_items = db
        .get_line_items(new_invoice.invoice_id)
        .await
        .expect("Failed to get line items");
    assert_eq!(new_items.len(), old_items.len());
    for item in &new_items {
        assert!(old_items.iter().all(|o| o.line_item_id != item.line_item_id));
    }

    let active = db
        .get_active_invoice_for_order(order_id)
        .await
        .expect("Failed to get active invoice")
        .expect("No active invoice");
    assert_eq!(active.invoice_id, new_invoice.invoice_id);
}

#[sqlx::test(migrations = "./migrations")]
async fn setting_a_new_default_commission_type_demotes_the_previous_one(pool: PgPool) {
    let db = Database::from_pool(pool);

    let standard = db
        .create_commission_type(&CreateCommissionType {
            name: "Standard".to_string(),
            fixed_amount: dec!(5),
            percentage_rate: dec!(2),
            is_default: true,
        })
        .await
        .expect("Failed to create commission type");
    let premium = db
        .create_commission_type(&CreateCommissionType {
            name: "Premium".to_string(),
            fixed_amount: dec!(10),
            percentage_rate: dec!(4),
            is_default: false,
        })
        .await
        .expect("Failed to create commission type");

    let updated = db
        .set_default_commission_type(premium.commission_type_id)
        .await
        .expect("Failed to set default")
        .expect("Commission type missing");
    assert!(updated.is_default);

    let types = db
        .list_commission_types()
        .await
        .expect("Failed to list commission types");
    let defaults: Vec<_> = types.iter().filter(|t| t.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].commission_type_id, premium.commission_type_id);
    assert!(types
        .iter()
        .find(|t| t.commission_type_id == standard.commission_type_id)
        .is_some_and(|t| !t.is_default));
}
