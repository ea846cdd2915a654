//! Floating-point helpers shared by apportionment and rate calculation.

/// Replace NaN and infinities with zero.
pub fn replace_indeterminate(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Quotient, or `None` when it is NaN or infinite.
pub fn checked_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    let q = numerator / denominator;
    q.is_finite().then_some(q)
}

/// Round half to even at the given number of decimal places.
///
/// Matches the rounding of the tabular tooling the published rates were
/// first produced with, so 0.125 rounds to 0.12 and 2.5 to 2.
pub fn round_half_even(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_indeterminate() {
        assert_eq!(replace_indeterminate(f64::NAN), 0.0);
        assert_eq!(replace_indeterminate(f64::INFINITY), 0.0);
        assert_eq!(replace_indeterminate(f64::NEG_INFINITY), 0.0);
        assert_eq!(replace_indeterminate(-1.5), -1.5);
    }

    #[test]
    fn test_checked_ratio() {
        assert_eq!(checked_ratio(6.0, 3.0), Some(2.0));
        assert_eq!(checked_ratio(1.0, 0.0), None);
        assert_eq!(checked_ratio(0.0, 0.0), None);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(1.25, 2), 1.25);
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_even(3.5, 0), 4.0);
        assert_eq!(round_half_even(-2.5, 0), -2.0);
        assert_eq!(round_half_even(1.2345, 2), 1.23);
    }
}
