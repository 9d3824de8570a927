//! Invoice calculator: subtotal, discount, tax, and line item
//! materialization for an order.

use super::{addon_price, base_price, carpet_area, round_currency, CarpetBilling, OrderBilling};
use crate::models::{DiscountType, ItemType, TaxSetting, Unit};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A line item as produced by the calculator, before persistence assigns
/// ids. Sort order preserves generation order for display.
#[derive(Debug, Clone)]
pub struct LineItemDraft {
    pub carpet_id: Option<Uuid>,
    pub item_type: ItemType,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit: Unit,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub sort_order: i32,
}

/// Aggregated invoice amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Sum the billable contribution of every carpet on the order.
///
/// Canceled carpets stay in the iteration but contribute zero.
pub fn calculate_subtotal(order: &OrderBilling) -> Decimal {
    let sum: Decimal = order.carpets.iter().map(carpet_contribution).sum();
    round_currency(sum)
}

fn carpet_contribution(billing: &CarpetBilling) -> Decimal {
    if billing.carpet.is_canceled() {
        return Decimal::ZERO;
    }
    let base = base_price(&billing.carpet, &billing.carpet_type);
    let addons: Decimal = billing
        .addons
        .iter()
        .map(|a| addon_price(&billing.carpet, &a.service, a.price_override))
        .sum();
    base + addons + billing.carpet.additional_charges
}

/// Discount amount for a subtotal. The discount never exceeds the
/// subtotal, so totals cannot go negative; a percentage above 100 is
/// treated as 100.
pub fn calculate_discount(subtotal: Decimal, value: Decimal, discount_type: DiscountType) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let amount = match discount_type {
        DiscountType::Percentage => subtotal * value / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => value,
    };
    round_currency(amount.min(subtotal))
}

/// Compute all invoice amounts. Tax applies to the subtotal after
/// discount; an absent or inactive tax setting taxes nothing.
pub fn compute_totals(
    order: &OrderBilling,
    discount_value: Decimal,
    discount_type: Option<DiscountType>,
    tax_setting: Option<&TaxSetting>,
) -> InvoiceTotals {
    let subtotal = calculate_subtotal(order);
    let discount_amount = match discount_type {
        Some(dt) => calculate_discount(subtotal, discount_value, dt),
        None => Decimal::ZERO,
    };
    let after_discount = subtotal - discount_amount;
    let tax_amount = tax_setting
        .map(|t| t.calculate_tax(after_discount))
        .unwrap_or(Decimal::ZERO);
    let total_amount = round_currency(after_discount + tax_amount);

    InvoiceTotals {
        subtotal,
        discount_amount,
        tax_amount,
        total_amount,
    }
}

/// Materialize line items for every carpet on the order, in carpet order:
/// one base item, one item per addon, one surcharge item when present.
///
/// Canceled carpets emit all their items with unit_price and subtotal
/// forced to zero while keeping the real quantity and unit, so the rows
/// remain traceable on the invoice.
pub fn build_line_items(order: &OrderBilling) -> Vec<LineItemDraft> {
    let mut items = Vec::new();
    let mut sort_order = 1;

    for billing in &order.carpets {
        let carpet = &billing.carpet;
        let canceled = carpet.is_canceled();
        let area = carpet_area(carpet);

        let (quantity, unit) = match area {
            Some(a) if billing.carpet_type.is_per_square_foot => (a, Unit::SqFt),
            _ => (Decimal::ONE, Unit::Piece),
        };
        let unit_price = if canceled {
            Decimal::ZERO
        } else if unit == Unit::SqFt {
            billing.carpet_type.price
        } else {
            base_price(carpet, &billing.carpet_type)
        };
        items.push(LineItemDraft {
            carpet_id: Some(carpet.carpet_id),
            item_type: ItemType::CarpetBase,
            name: billing.carpet_type.name.clone(),
            description: Some(base_description(billing, canceled)),
            quantity,
            unit,
            unit_price,
            subtotal: round_currency(quantity * unit_price),
            sort_order,
        });
        sort_order += 1;

        for addon in &billing.addons {
            let price = if canceled {
                Decimal::ZERO
            } else {
                addon_price(carpet, &addon.service, addon.price_override)
            };
            items.push(LineItemDraft {
                carpet_id: Some(carpet.carpet_id),
                item_type: ItemType::AddonService,
                name: addon.service.name.clone(),
                description: Some(format!("For carpet {}", carpet.scan_code)),
                quantity: Decimal::ONE,
                unit: Unit::Service,
                unit_price: price,
                subtotal: price,
                sort_order,
            });
            sort_order += 1;
        }

        if carpet.additional_charges > Decimal::ZERO {
            let price = if canceled {
                Decimal::ZERO
            } else {
                round_currency(carpet.additional_charges)
            };
            items.push(LineItemDraft {
                carpet_id: Some(carpet.carpet_id),
                item_type: ItemType::Other,
                name: "Additional Charges".to_string(),
                description: Some(format!("For carpet {}", carpet.scan_code)),
                quantity: Decimal::ONE,
                unit: Unit::Charge,
                unit_price: price,
                subtotal: price,
                sort_order,
            });
            sort_order += 1;
        }
    }

    items
}

fn base_description(billing: &CarpetBilling, canceled: bool) -> String {
    let carpet = &billing.carpet;
    let mut description = format!("Scan {}", carpet.scan_code);
    if let (Some(width), Some(length), Some(area)) =
        (carpet.width, carpet.length, carpet_area(carpet))
    {
        description.push_str(&format!(
            ", {} x {} ft ({} sq ft)",
            width,
            length,
            area.normalize()
        ));
    }
    if let Some(color) = &carpet.color {
        description.push_str(&format!(", {}", color));
    }
    if canceled {
        description.push_str(" [CANCELED]");
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::PricedAddon;
    use crate::models::{AddonService, Carpet, CarpetType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn carpet_type(name: &str, price: Decimal, per_sq_ft: bool) -> CarpetType {
        CarpetType {
            carpet_type_id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            is_per_square_foot: per_sq_ft,
            active: true,
            created_utc: Utc::now(),
        }
    }

    fn carpet(
        scan_code: &str,
        width: Option<Decimal>,
        length: Option<Decimal>,
        additional_charges: Decimal,
        status: &str,
    ) -> Carpet {
        Carpet {
            carpet_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            carpet_type_id: Uuid::new_v4(),
            scan_code: scan_code.to_string(),
            color: Some("Red".to_string()),
            width,
            length,
            additional_charges,
            status: status.to_string(),
            created_utc: Utc::now(),
        }
    }

    fn addon(name: &str, price: Decimal, per_sq_ft: bool) -> AddonService {
        AddonService {
            addon_service_id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            is_per_square_foot: per_sq_ft,
            active: true,
            created_utc: Utc::now(),
        }
    }

    fn order_of(carpets: Vec<CarpetBilling>) -> OrderBilling {
        OrderBilling { carpets }
    }

    #[test]
    fn subtotal_sums_base_prices_without_addons() {
        let order = order_of(vec![
            CarpetBilling {
                carpet: carpet("C-1", Some(dec!(2)), Some(dec!(3)), Decimal::ZERO, "received"),
                carpet_type: carpet_type("Wool", dec!(50), true),
                addons: vec![],
            },
            CarpetBilling {
                carpet: carpet("C-2", None, None, Decimal::ZERO, "received"),
                carpet_type: carpet_type("Silk", dec!(120), false),
                addons: vec![],
            },
        ]);
        assert_eq!(calculate_subtotal(&order), dec!(420));
    }

    #[test]
    fn canceled_carpet_contributes_zero_to_subtotal() {
        let order = order_of(vec![
            CarpetBilling {
                carpet: carpet("C-1", Some(dec!(2)), Some(dec!(3)), dec!(10), "canceled"),
                carpet_type: carpet_type("Wool", dec!(50), true),
                addons: vec![PricedAddon {
                    service: addon("Deodorize", dec!(25), false),
                    price_override: None,
                }],
            },
            CarpetBilling {
                carpet: carpet("C-2", None, None, Decimal::ZERO, "received"),
                carpet_type: carpet_type("Silk", dec!(120), false),
                addons: vec![],
            },
        ]);
        assert_eq!(calculate_subtotal(&order), dec!(120));
    }

    #[test]
    fn additional_charges_and_addons_included_for_live_carpets() {
        let order = order_of(vec![CarpetBilling {
            carpet: carpet("C-1", Some(dec!(2)), Some(dec!(3)), dec!(10), "received"),
            carpet_type: carpet_type("Wool", dec!(50), true),
            addons: vec![PricedAddon {
                service: addon("Deodorize", dec!(25), false),
                price_override: Some(dec!(20)),
            }],
        }]);
        // 300 base + 20 override + 10 surcharge
        assert_eq!(calculate_subtotal(&order), dec!(330));
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        assert_eq!(
            calculate_discount(dec!(100), dec!(150), DiscountType::Fixed),
            dec!(100)
        );
        assert_eq!(
            calculate_discount(dec!(100), dec!(30), DiscountType::Fixed),
            dec!(30)
        );
    }

    #[test]
    fn percentage_discount_rounds_to_cents() {
        assert_eq!(
            calculate_discount(dec!(200), dec!(10), DiscountType::Percentage),
            dec!(20)
        );
        assert_eq!(
            calculate_discount(dec!(99.99), dec!(7.5), DiscountType::Percentage),
            dec!(7.50)
        );
    }

    #[test]
    fn percentage_discount_above_one_hundred_clamps_to_subtotal() {
        assert_eq!(
            calculate_discount(dec!(100), dec!(150), DiscountType::Percentage),
            dec!(100)
        );
        let order = order_of(vec![CarpetBilling {
            carpet: carpet("C-1", None, None, Decimal::ZERO, "received"),
            carpet_type: carpet_type("Silk", dec!(120), false),
            addons: vec![],
        }]);
        let totals = compute_totals(&order, dec!(250), Some(DiscountType::Percentage), None);
        assert_eq!(totals.discount_amount, dec!(120));
        assert_eq!(totals.total_amount, Decimal::ZERO);
    }

    #[test]
    fn non_positive_discount_value_is_ignored() {
        assert_eq!(
            calculate_discount(dec!(100), Decimal::ZERO, DiscountType::Fixed),
            Decimal::ZERO
        );
    }

    #[test]
    fn totals_tie_out_to_subtotal_minus_discount_plus_tax() {
        let order = order_of(vec![CarpetBilling {
            carpet: carpet("C-1", Some(dec!(2)), Some(dec!(3)), Decimal::ZERO, "received"),
            carpet_type: carpet_type("Wool", dec!(50), true),
            addons: vec![],
        }]);
        let tax = TaxSetting {
            tax_setting_id: Uuid::new_v4(),
            name: "SST".to_string(),
            rate: dec!(6),
            calculation: "percentage".to_string(),
            active: true,
            created_utc: Utc::now(),
        };
        let totals = compute_totals(&order, dec!(10), Some(DiscountType::Percentage), Some(&tax));
        assert_eq!(totals.subtotal, dec!(300));
        assert_eq!(totals.discount_amount, dec!(30));
        assert_eq!(totals.tax_amount, dec!(16.20));
        assert_eq!(totals.total_amount, dec!(286.20));
        assert_eq!(
            totals.total_amount,
            round_currency(totals.subtotal - totals.discount_amount + totals.tax_amount)
        );
    }

    #[test]
    fn line_items_preserve_generation_order() {
        let order = order_of(vec![CarpetBilling {
            carpet: carpet("C-1", Some(dec!(2)), Some(dec!(3)), dec!(10), "received"),
            carpet_type: carpet_type("Wool", dec!(50), true),
            addons: vec![PricedAddon {
                service: addon("Deodorize", dec!(25), false),
                price_override: None,
            }],
        }]);
        let items = build_line_items(&order);
        assert_eq!(items.len(), 3);
        assert_eq!(
            items.iter().map(|i| i.sort_order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(items[0].item_type, ItemType::CarpetBase);
        assert_eq!(items[0].quantity, dec!(6));
        assert_eq!(items[0].unit, Unit::SqFt);
        assert_eq!(items[0].unit_price, dec!(50));
        assert_eq!(items[0].subtotal, dec!(300));
        assert_eq!(items[1].item_type, ItemType::AddonService);
        assert_eq!(items[1].unit, Unit::Service);
        assert_eq!(items[1].subtotal, dec!(25));
        assert_eq!(items[2].item_type, ItemType::Other);
        assert_eq!(items[2].name, "Additional Charges");
        assert_eq!(items[2].subtotal, dec!(10));
    }

    #[test]
    fn canceled_carpet_items_are_zeroed_but_keep_quantity_and_unit() {
        let order = order_of(vec![CarpetBilling {
            carpet: carpet("C-9", Some(dec!(4)), Some(dec!(5)), dec!(10), "canceled"),
            carpet_type: carpet_type("Wool", dec!(50), true),
            addons: vec![PricedAddon {
                service: addon("Deodorize", dec!(25), false),
                price_override: None,
            }],
        }]);
        let items = build_line_items(&order);
        assert_eq!(items.len(), 3);
        for item in &items {
            assert_eq!(item.unit_price, Decimal::ZERO);
            assert_eq!(item.subtotal, Decimal::ZERO);
        }
        assert_eq!(items[0].quantity, dec!(20));
        assert_eq!(items[0].unit, Unit::SqFt);
        assert!(items[0].description.as_deref().unwrap().contains("[CANCELED]"));
    }

    #[test]
    fn unmeasured_carpet_bills_as_one_piece() {
        let order = order_of(vec![CarpetBilling {
            carpet: carpet("C-3", None, None, Decimal::ZERO, "received"),
            carpet_type: carpet_type("Wool", dec!(50), true),
            addons: vec![],
        }]);
        let items = build_line_items(&order);
        assert_eq!(items[0].quantity, Decimal::ONE);
        assert_eq!(items[0].unit, Unit::Piece);
        assert_eq!(items[0].unit_price, dec!(50));
    }

    #[test]
    fn line_item_subtotals_tie_out_to_order_subtotal() {
        let order = order_of(vec![
            CarpetBilling {
                carpet: carpet("C-1", Some(dec!(2.5)), Some(dec!(3.5)), dec!(7.25), "received"),
                carpet_type: carpet_type("Wool", dec!(4.99), true),
                addons: vec![PricedAddon {
                    service: addon("Scotchgard", dec!(1.25), true),
                    price_override: None,
                }],
            },
            CarpetBilling {
                carpet: carpet("C-2", Some(dec!(6)), Some(dec!(2)), Decimal::ZERO, "canceled"),
                carpet_type: carpet_type("Silk", dec!(120), false),
                addons: vec![],
            },
        ]);
        let items = build_line_items(&order);
        let item_sum: Decimal = items.iter().map(|i| i.subtotal).sum();
        assert_eq!(round_currency(item_sum), calculate_subtotal(&order));
    }
}
