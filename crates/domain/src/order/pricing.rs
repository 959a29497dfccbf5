//! Order pricing.

use common::Money;
use store::CartLine;

use crate::error::PricingError;

/// Sums `unit_price * quantity` over the price snapshots of a cart.
///
/// Computed once when the order is created; the stored total is never
/// re-derived from current product prices.
pub fn total_price(lines: &[CartLine]) -> Result<Money, PricingError> {
    lines.iter().try_fold(Money::zero(), |total, line| {
        line.line_total()
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or(PricingError::Overflow {
                product_id: line.product_id,
            })
    })
}
