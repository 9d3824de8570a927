//! Commission calculator: rate resolution and payout math.

use super::round_currency;
use crate::models::{Agent, CommissionType};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A resolved commission rate: fixed amount plus percentage of the
/// invoice total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionRate {
    pub commission_type_id: Option<Uuid>,
    pub fixed_amount: Decimal,
    pub percentage_rate: Decimal,
}

/// Resolve the commission rate for an agent.
///
/// Ordered cascade, first non-null wins per field:
/// 1. agent-specific overrides on the commission-type association,
/// 2. the commission type's base rates,
/// 3. the agent's own flat commission fields when no type is linked.
pub fn resolve_rate(agent: &Agent, commission_type: Option<&CommissionType>) -> CommissionRate {
    match commission_type {
        Some(ct) => CommissionRate {
            commission_type_id: Some(ct.commission_type_id),
            fixed_amount: agent.fixed_amount_override.unwrap_or(ct.fixed_amount),
            percentage_rate: agent.percentage_rate_override.unwrap_or(ct.percentage_rate),
        },
        None => CommissionRate {
            commission_type_id: None,
            fixed_amount: agent.fixed_commission.unwrap_or(Decimal::ZERO),
            percentage_rate: agent.percentage_commission.unwrap_or(Decimal::ZERO),
        },
    }
}

/// Payout for an invoice total under a resolved rate:
/// fixed + percentage% of the total, rounded to cents.
pub fn total_commission(rate: &CommissionRate, invoice_total: Decimal) -> Decimal {
    round_currency(rate.fixed_amount + rate.percentage_rate / Decimal::ONE_HUNDRED * invoice_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn agent() -> Agent {
        Agent {
            agent_id: Uuid::new_v4(),
            name: "Aisha".to_string(),
            phone: None,
            email: None,
            commission_type_id: None,
            fixed_amount_override: None,
            percentage_rate_override: None,
            fixed_commission: None,
            percentage_commission: None,
            active: true,
            created_utc: Utc::now(),
        }
    }

    fn commission_type(fixed: Decimal, rate: Decimal) -> CommissionType {
        CommissionType {
            commission_type_id: Uuid::new_v4(),
            name: "Standard".to_string(),
            fixed_amount: fixed,
            percentage_rate: rate,
            is_default: false,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn agent_overrides_take_precedence_over_type_base() {
        let mut a = agent();
        a.fixed_amount_override = Some(dec!(15));
        a.percentage_rate_override = Some(dec!(8));
        let ct = commission_type(dec!(10), dec!(5));

        let rate = resolve_rate(&a, Some(&ct));
        assert_eq!(rate.fixed_amount, dec!(15));
        assert_eq!(rate.percentage_rate, dec!(8));
        assert_eq!(rate.commission_type_id, Some(ct.commission_type_id));
    }

    #[test]
    fn partial_override_falls_back_per_field() {
        let mut a = agent();
        a.percentage_rate_override = Some(dec!(8));
        let ct = commission_type(dec!(10), dec!(5));

        let rate = resolve_rate(&a, Some(&ct));
        assert_eq!(rate.fixed_amount, dec!(10));
        assert_eq!(rate.percentage_rate, dec!(8));
    }

    #[test]
    fn type_base_rates_apply_without_overrides() {
        let rate = resolve_rate(&agent(), Some(&commission_type(dec!(10), dec!(5))));
        assert_eq!(rate.fixed_amount, dec!(10));
        assert_eq!(rate.percentage_rate, dec!(5));
    }

    #[test]
    fn flat_agent_fields_apply_when_no_type_is_linked() {
        let mut a = agent();
        a.fixed_commission = Some(dec!(20));
        a.percentage_commission = Some(dec!(3));

        let rate = resolve_rate(&a, None);
        assert_eq!(rate.commission_type_id, None);
        assert_eq!(rate.fixed_amount, dec!(20));
        assert_eq!(rate.percentage_rate, dec!(3));
    }

    #[test]
    fn unconfigured_agent_earns_nothing() {
        let rate = resolve_rate(&agent(), None);
        assert_eq!(total_commission(&rate, dec!(500)), Decimal::ZERO);
    }

    #[test]
    fn payout_is_fixed_plus_percentage_of_total() {
        let rate = CommissionRate {
            commission_type_id: None,
            fixed_amount: dec!(10),
            percentage_rate: dec!(5),
        };
        assert_eq!(total_commission(&rate, dec!(286.20)), dec!(24.31));
    }
}
