//! Pure billing core: pricing, invoice math, and commission resolution.
//!
//! Everything in this module is a function of its inputs; persistence and
//! transactions live in `services`.

pub mod calculator;
pub mod commission;
pub mod numbering;
pub mod pricing;

use crate::models::{AddonService, Carpet, CarpetType};
use rust_decimal::{Decimal, RoundingStrategy};

pub use calculator::{
    build_line_items, calculate_discount, calculate_subtotal, compute_totals, InvoiceTotals,
    LineItemDraft,
};
pub use commission::{resolve_rate, total_commission, CommissionRate};
pub use numbering::revision_number;
pub use pricing::{addon_price, base_price, carpet_area};

/// Currency-safe rounding to 2 decimal places.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// An addon service attached to a carpet, with the attachment's optional
/// price override.
#[derive(Debug, Clone)]
pub struct PricedAddon {
    pub service: AddonService,
    pub price_override: Option<Decimal>,
}

/// A carpet with its resolved type and addons, ready for pricing.
#[derive(Debug, Clone)]
pub struct CarpetBilling {
    pub carpet: Carpet,
    pub carpet_type: CarpetType,
    pub addons: Vec<PricedAddon>,
}

/// The billable view of an order.
#[derive(Debug, Clone, Default)]
pub struct OrderBilling {
    pub carpets: Vec<CarpetBilling>,
}
