//! Pricing resolver: base and addon prices for a single carpet.

use super::round_currency;
use crate::models::{AddonService, Carpet, CarpetType};
use rust_decimal::Decimal;

/// Area in square feet, only when both dimensions are measured and
/// positive.
pub fn carpet_area(carpet: &Carpet) -> Option<Decimal> {
    match (carpet.width, carpet.length) {
        (Some(w), Some(l)) if w > Decimal::ZERO && l > Decimal::ZERO => Some(w * l),
        _ => None,
    }
}

/// Base price of a carpet given its type.
///
/// Per-square-foot types price at width x length x price. A missing or
/// zero dimension falls back to the flat type price; that is policy, not
/// an error.
pub fn base_price(carpet: &Carpet, carpet_type: &CarpetType) -> Decimal {
    match carpet_area(carpet) {
        Some(area) if carpet_type.is_per_square_foot => round_currency(area * carpet_type.price),
        _ => round_currency(carpet_type.price),
    }
}

/// Price of one addon service on a carpet.
///
/// The attachment's override, when present, replaces the computed price
/// entirely. Otherwise the addon's own per-square-foot flag decides,
/// independently of the carpet type's pricing mode.
pub fn addon_price(
    carpet: &Carpet,
    service: &AddonService,
    price_override: Option<Decimal>,
) -> Decimal {
    if let Some(price) = price_override {
        return round_currency(price);
    }
    match carpet_area(carpet) {
        Some(area) if service.is_per_square_foot => round_currency(area * service.price),
        _ => round_currency(service.price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn carpet(width: Option<Decimal>, length: Option<Decimal>) -> Carpet {
        Carpet {
            carpet_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            carpet_type_id: Uuid::new_v4(),
            scan_code: "C-0001".to_string(),
            color: None,
            width,
            length,
            additional_charges: Decimal::ZERO,
            status: "received".to_string(),
            created_utc: Utc::now(),
        }
    }

    fn carpet_type(price: Decimal, per_sq_ft: bool) -> CarpetType {
        CarpetType {
            carpet_type_id: Uuid::new_v4(),
            name: "Wool".to_string(),
            price,
            is_per_square_foot: per_sq_ft,
            active: true,
            created_utc: Utc::now(),
        }
    }

    fn addon(price: Decimal, per_sq_ft: bool) -> AddonService {
        AddonService {
            addon_service_id: Uuid::new_v4(),
            name: "Scotchgard".to_string(),
            price,
            is_per_square_foot: per_sq_ft,
            active: true,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn per_square_foot_base_price_multiplies_by_area() {
        let c = carpet(Some(dec!(2)), Some(dec!(3)));
        assert_eq!(base_price(&c, &carpet_type(dec!(50), true)), dec!(300));
    }

    #[test]
    fn flat_type_ignores_dimensions() {
        let c = carpet(Some(dec!(2)), Some(dec!(3)));
        assert_eq!(base_price(&c, &carpet_type(dec!(80), false)), dec!(80));
    }

    #[test]
    fn missing_or_zero_dimension_falls_back_to_flat_price() {
        let unmeasured = carpet(None, Some(dec!(3)));
        assert_eq!(base_price(&unmeasured, &carpet_type(dec!(50), true)), dec!(50));

        let zero_width = carpet(Some(dec!(0)), Some(dec!(3)));
        assert_eq!(base_price(&zero_width, &carpet_type(dec!(50), true)), dec!(50));
    }

    #[test]
    fn addon_pricing_mode_is_independent_of_carpet_type() {
        let c = carpet(Some(dec!(4)), Some(dec!(5)));
        assert_eq!(addon_price(&c, &addon(dec!(2), true), None), dec!(40));
        assert_eq!(addon_price(&c, &addon(dec!(15), false), None), dec!(15));
    }

    #[test]
    fn price_override_replaces_computed_price_entirely() {
        let c = carpet(Some(dec!(4)), Some(dec!(5)));
        assert_eq!(
            addon_price(&c, &addon(dec!(2), true), Some(dec!(12.50))),
            dec!(12.50)
        );
    }
}
