//! End-to-end billing scenarios over the public billing API, covering
//! the full pipeline from carpet pricing through invoice totals and the
//! agent commission on the result.

use chrono::Utc;
use cleaning_service::billing::{
    build_line_items, calculate_subtotal, compute_totals, resolve_rate, revision_number,
    round_currency, total_commission, CarpetBilling, OrderBilling, PricedAddon,
};
use cleaning_service::models::{
    AddonService, Agent, Carpet, CarpetType, CommissionType, DiscountType, ItemType, TaxSetting,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn wool_type() -> CarpetType {
    CarpetType {
        carpet_type_id: Uuid::new_v4(),
        name: "Wool".to_string(),
        price: dec!(4.50),
        is_per_square_foot: true,
        active: true,
        created_utc: Utc::now(),
    }
}

fn doormat_type() -> CarpetType {
    CarpetType {
        carpet_type_id: Uuid::new_v4(),
        name: "Doormat".to_string(),
        price: dec!(15),
        is_per_square_foot: false,
        active: true,
        created_utc: Utc::now(),
    }
}

fn carpet(type_id: Uuid, scan: &str, dims: Option<(Decimal, Decimal)>, extra: Decimal) -> Carpet {
    Carpet {
        carpet_id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        carpet_type_id: type_id,
        scan_code: scan.to_string(),
        color: Some("Beige".to_string()),
        width: dims.map(|(w, _)| w),
        length: dims.map(|(_, l)| l),
        additional_charges: extra,
        status: "received".to_string(),
        created_utc: Utc::now(),
    }
}

fn scotchgard() -> AddonService {
    AddonService {
        addon_service_id: Uuid::new_v4(),
        name: "Scotchgard".to_string(),
        price: dec!(0.75),
        is_per_square_foot: true,
        active: true,
        created_utc: Utc::now(),
    }
}

fn sst() -> TaxSetting {
    TaxSetting {
        tax_setting_id: Uuid::new_v4(),
        name: "SST".to_string(),
        rate: dec!(6),
        calculation: "percentage".to_string(),
        active: true,
        created_utc: Utc::now(),
    }
}

/// A measured per-square-foot carpet with a per-square-foot addon, a
/// flat-priced doormat, a percentage discount, and percentage tax.
#[test]
fn mixed_order_bills_end_to_end() {
    let wool = wool_type();
    let doormat = doormat_type();

    let order = OrderBilling {
        carpets: vec![
            CarpetBilling {
                // 8 x 10 = 80 sq ft; base 80 * 4.50 = 360, addon 80 * 0.75 = 60
                carpet: carpet(wool.carpet_type_id, "SC-0001", Some((dec!(8), dec!(10))), dec!(0)),
                carpet_type: wool.clone(),
                addons: vec![PricedAddon {
                    service: scotchgard(),
                    price_override: None,
                }],
            },
            CarpetBilling {
                carpet: carpet(doormat.carpet_type_id, "SC-0002", None, dec!(5)),
                carpet_type: doormat.clone(),
                addons: vec![],
            },
        ],
    };

    // 360 + 60 + 15 + 5
    assert_eq!(calculate_subtotal(&order), dec!(440));

    let tax = sst();
    let totals = compute_totals(&order, dec!(10), Some(DiscountType::Percentage), Some(&tax));
    assert_eq!(totals.discount_amount, dec!(44));
    // 6% of 396
    assert_eq!(totals.tax_amount, dec!(23.76));
    assert_eq!(totals.total_amount, dec!(419.76));

    let items = build_line_items(&order);
    // wool base + scotchgard, doormat base + surcharge
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].quantity, dec!(80));
    assert_eq!(items[0].unit_price, dec!(4.50));
    assert_eq!(items[3].item_type, ItemType::Other);
    assert_eq!(items[3].subtotal, dec!(5));

    let item_sum: Decimal = items.iter().map(|i| i.subtotal).sum();
    assert_eq!(round_currency(item_sum), totals.subtotal);
}

/// Canceling a carpet zeroes its contribution but keeps its rows, so a
/// regenerated invoice still shows the carpet for audit.
#[test]
fn regeneration_after_carpet_cancellation_drops_its_charges() {
    let wool = wool_type();
    let mut first = CarpetBilling {
        carpet: carpet(wool.carpet_type_id, "SC-0101", Some((dec!(5), dec!(6))), dec!(12)),
        carpet_type: wool.clone(),
        addons: vec![],
    };
    let second = CarpetBilling {
        carpet: carpet(wool.carpet_type_id, "SC-0102", Some((dec!(4), dec!(4))), dec!(0)),
        carpet_type: wool.clone(),
        addons: vec![],
    };

    let before = compute_totals(
        &OrderBilling {
            carpets: vec![first.clone(), second.clone()],
        },
        Decimal::ZERO,
        None,
        None,
    );
    // 30 * 4.50 + 12 + 16 * 4.50
    assert_eq!(before.total_amount, dec!(219));

    first.carpet.status = "canceled".to_string();
    let order = OrderBilling {
        carpets: vec![first, second],
    };
    let after = compute_totals(&order, Decimal::ZERO, None, None);
    assert_eq!(after.total_amount, dec!(72));

    let items = build_line_items(&order);
    // canceled base + its zeroed surcharge, then the live carpet's base
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].subtotal, Decimal::ZERO);
    assert_eq!(items[1].subtotal, Decimal::ZERO);
    assert!(items[0].description.as_deref().unwrap().contains("[CANCELED]"));
    assert_eq!(items[2].subtotal, dec!(72));
}

/// Revision numbers chain off the original canonical number.
#[test]
fn revision_chain_numbers_stay_tied_to_the_original() {
    let original = "INV-20260824-9F3A61D2";
    let r1 = revision_number(original);
    let r2 = revision_number(&r1);
    let r3 = revision_number(&r2);
    assert_eq!(r1, "INV-20260824-9F3A61D2-R1");
    assert_eq!(r2, "INV-20260824-9F3A61D2-R2");
    assert_eq!(r3, "INV-20260824-9F3A61D2-R3");
}

/// Commission on the invoice total follows the rate cascade.
#[test]
fn commission_follows_rate_cascade_on_invoice_total() {
    let ct = CommissionType {
        commission_type_id: Uuid::new_v4(),
        name: "Standard".to_string(),
        fixed_amount: dec!(5),
        percentage_rate: dec!(4),
        is_default: true,
        created_utc: Utc::now(),
    };
    let mut agent = Agent {
        agent_id: Uuid::new_v4(),
        name: "Rahim".to_string(),
        phone: None,
        email: None,
        commission_type_id: Some(ct.commission_type_id),
        fixed_amount_override: None,
        percentage_rate_override: Some(dec!(6)),
        fixed_commission: None,
        percentage_commission: None,
        active: true,
        created_utc: Utc::now(),
    };

    let rate = resolve_rate(&agent, Some(&ct));
    // 5 fixed from the type, 6% from the agent override
    assert_eq!(total_commission(&rate, dec!(419.76)), dec!(30.19));

    // Without a type the agent's flat fields apply.
    agent.commission_type_id = None;
    agent.percentage_rate_override = None;
    agent.fixed_commission = Some(dec!(10));
    let flat = resolve_rate(&agent, None);
    assert_eq!(total_commission(&flat, dec!(419.76)), dec!(10));
}

/// A fixed discount larger than the subtotal clamps, keeping the total
/// non-negative even with fixed tax stacked on top.
#[test]
fn oversized_fixed_discount_clamps_to_subtotal() {
    let doormat = doormat_type();
    let order = OrderBilling {
        carpets: vec![CarpetBilling {
            carpet: carpet(doormat.carpet_type_id, "SC-0301", None, dec!(0)),
            carpet_type: doormat,
            addons: vec![],
        }],
    };

    let fixed_tax = TaxSetting {
        calculation: "fixed".to_string(),
        rate: dec!(2),
        ..sst()
    };
    let totals = compute_totals(&order, dec!(100), Some(DiscountType::Fixed), Some(&fixed_tax));
    assert_eq!(totals.subtotal, dec!(15));
    assert_eq!(totals.discount_amount, dec!(15));
    assert_eq!(totals.total_amount, dec!(2));
}
