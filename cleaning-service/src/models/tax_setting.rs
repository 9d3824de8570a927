//! Tax setting model for cleaning-service.

use crate::billing::round_currency;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tax configuration. `calculation` is either `percentage` (rate percent
/// of the taxed amount) or `fixed` (flat amount per invoice).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxSetting {
    pub tax_setting_id: Uuid,
    pub name: String,
    pub rate: Decimal,
    pub calculation: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl TaxSetting {
    /// Tax due on `amount`. Inactive settings never tax.
    pub fn calculate_tax(&self, amount: Decimal) -> Decimal {
        if !self.active {
            return Decimal::ZERO;
        }
        if self.calculation == "fixed" {
            round_currency(self.rate)
        } else {
            round_currency(amount * self.rate / Decimal::ONE_HUNDRED)
        }
    }
}

/// Input for creating a tax setting.
#[derive(Debug, Clone)]
pub struct CreateTaxSetting {
    pub name: String,
    pub rate: Decimal,
    pub calculation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn setting(rate: Decimal, calculation: &str, active: bool) -> TaxSetting {
        TaxSetting {
            tax_setting_id: Uuid::new_v4(),
            name: "GST".to_string(),
            rate,
            calculation: calculation.to_string(),
            active,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn percentage_tax_rounds_to_cents() {
        let t = setting(dec!(6), "percentage", true);
        assert_eq!(t.calculate_tax(dec!(99.99)), dec!(6.00));
        assert_eq!(t.calculate_tax(dec!(100)), dec!(6.00));
    }

    #[test]
    fn fixed_tax_ignores_amount() {
        let t = setting(dec!(5), "fixed", true);
        assert_eq!(t.calculate_tax(dec!(1000)), dec!(5.00));
    }

    #[test]
    fn inactive_setting_taxes_nothing() {
        let t = setting(dec!(6), "percentage", false);
        assert_eq!(t.calculate_tax(dec!(100)), Decimal::ZERO);
    }
}
