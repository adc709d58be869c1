//! Threshold snapping applied after the solve and during allocation.
//!
//! Values whose magnitude falls below the threshold become exactly zero.
//! Nothing is re-normalized afterwards, so a snapped weight vector may sum
//! to slightly less than one.

use rust_decimal::Decimal;

/// Zero every weight with `|w| < threshold`.
///
/// For long-only bounds this is the same as `w < threshold`. With a negative
/// `lower_bound`, a short position of at least `threshold` is kept rather
/// than zeroed.
pub fn snap_weights(weights: &[f64], threshold: f64) -> Vec<f64> {
    weights
        .iter()
        .map(|&w| if w.abs() < threshold { 0.0 } else { w })
        .collect()
}

/// Decimal counterpart used for cash amounts and share counts.
pub fn snap_amount(value: Decimal, threshold: Decimal) -> Decimal {
    if value.abs() < threshold {
        Decimal::ZERO
    } else {
        value
    }
}
