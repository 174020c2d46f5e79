/////////////////////////////////////////////////////////////////////////////////////////////\
//
// Shared statistics and numeric conversion helpers for the change-point model.
//
// Created on: 16 Oct 2026     Author: Tobias Kragholm
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities
//!
//! Shared numeric helpers for moments, order statistics, and lossless-enough
//! integer to float conversion.

use num_traits::ToPrimitive;

/// Convert a count to `f64`, saturating at `u32::MAX`.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

/// Convert a signed index to `f64`, yielding `NaN` if it is not representable.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Arithmetic mean, or `NaN` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / usize_to_f64(values.len())
}

/// Unbiased (`n - 1`) variance around a precomputed mean.
#[must_use]
pub fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values
        .iter()
        .map(|value| {
            let centered = *value - mean;
            centered * centered
        })
        .sum::<f64>()
        / usize_to_f64(values.len() - 1)
}

/// Linearly interpolated percentile of an ascending slice.
#[must_use]
pub fn percentile(sorted_values: &[f64], probability: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }

    let clamped = probability.clamp(0.0, 1.0);
    let last = sorted_values.len() - 1;
    let position = clamped * usize_to_f64(last);
    let lower = position.floor().to_usize().unwrap_or(0);
    let upper = position.ceil().to_usize().unwrap_or(last);

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = position - usize_to_f64(lower);
        (1.0 - weight).mul_add(sorted_values[lower], weight * sorted_values[upper])
    }
}

/// Round to the nearest integer index, ties up, clamped to `[0, len - 1]`.
///
/// Returns `None` for an empty range or a non-finite value.
#[must_use]
pub fn round_half_up_index(value: f64, len: usize) -> Option<usize> {
    if len == 0 || !value.is_finite() {
        return None;
    }
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };
    let rounded = rounded.max(0.0);
    Some(rounded.to_usize().unwrap_or(usize::MAX).min(len - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_of_empty_slice_is_nan() {
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn sample_variance_is_zero_for_single_value() {
        assert_relative_eq!(sample_variance(&[3.0], 3.0), 0.0);
    }

    #[test]
    fn sample_variance_uses_bessel_correction() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(sample_variance(&values, mean(&values)), 5.0 / 3.0);
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile(&sorted, 0.5), 20.0);
        assert_relative_eq!(percentile(&sorted, 0.125), 5.0);
        assert_relative_eq!(percentile(&sorted, 1.5), 40.0);
    }

    #[test]
    fn rounding_breaks_ties_upward() {
        assert_eq!(round_half_up_index(2.5, 10), Some(3));
        assert_eq!(round_half_up_index(2.499, 10), Some(2));
        assert_eq!(round_half_up_index(3.5, 10), Some(4));
        assert_eq!(round_half_up_index(0.499_999_999_999_999_94, 10), Some(0));
        assert_eq!(round_half_up_index(-0.5, 10), Some(0));
    }

    #[test]
    fn rounding_clamps_to_valid_range() {
        assert_eq!(round_half_up_index(-0.7, 5), Some(0));
        assert_eq!(round_half_up_index(4.6, 5), Some(4));
        assert_eq!(round_half_up_index(f64::NAN, 5), None);
        assert_eq!(round_half_up_index(1.0, 0), None);
    }
}
