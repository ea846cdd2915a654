//! Age-bucket label parsing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{age_to_cohort, Coverage, OPEN_COHORT};

// =============================================================================
// LAZY STATIC PATTERNS
// =============================================================================

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

static UNDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)under.*?(\d+)").unwrap());

/// Derive the canonical cohorts a free-text age label covers.
///
/// - `"under N"` covers cohorts `1..cohort(N)`, upper bound exclusive.
/// - Two numbers cover `cohort(first)..=cohort(second)`.
/// - One number covers `cohort(first)..=18`.
/// - No numbers at all marks the all-ages total.
///
/// ```
/// use harmonize::cohort::parse_label;
///
/// let c = parse_label("15 to 19 years");
/// assert_eq!(c.iter().collect::<Vec<_>>(), vec![4]);
/// ```
pub fn parse_label(label: &str) -> Coverage {
    if let Some(caps) = UNDER.captures(label) {
        return match caps[1].parse::<u32>() {
            Ok(age) => Coverage::span(1, age_to_cohort(age) - 1),
            Err(_) => Coverage::empty(),
        };
    }

    let mut numbers = NUMBER
        .find_iter(label)
        .filter_map(|m| m.as_str().parse::<u32>().ok());

    match (numbers.next(), numbers.next()) {
        (None, _) => Coverage::total(),
        (Some(first), None) => Coverage::span(age_to_cohort(first), OPEN_COHORT as u32),
        (Some(first), Some(last)) => Coverage::span(age_to_cohort(first), age_to_cohort(last)),
    }
}
