use super::engine::{sum_tax_values, sum_tier_values};
use super::error::InvariantViolation;
use super::types::BillResult;

pub const TOTAL_TOLERANCE: f64 = 0.01;

/// Recomputes the total from the line items rather than the stored sums.
pub fn verify(result: &BillResult) -> Result<(), InvariantViolation> {
    if !result.grand_total.is_finite() {
        return Err(InvariantViolation::NonFiniteTotal);
    }
    if result.grand_total < 0.0 {
        return Err(InvariantViolation::NegativeTotal(result.grand_total));
    }

    let recomputed =
        sum_tier_values(&result.tiers) + result.surcharge + sum_tax_values(&result.taxes);
    // Negated so a NaN surcharge or line value also fails.
    if !((recomputed - result.grand_total).abs() < TOTAL_TOLERANCE) {
        return Err(InvariantViolation::TotalMismatch {
            grand_total: result.grand_total,
            recomputed,
            tolerance: TOTAL_TOLERANCE,
        });
    }
    Ok(())
}

pub fn check_invariants(result: &BillResult) -> bool {
    verify(result).is_ok()
}
