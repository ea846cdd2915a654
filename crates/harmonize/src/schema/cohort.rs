//! The canonical cohort schema.
//!
//! Cohort 0 is the all-ages total, cohorts 1 through 17 are consecutive
//! five-year bands starting at age 0, and cohort 18 is 85 and over.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Number of canonical cohorts, including the total.
pub const COHORT_COUNT: usize = 19;

/// The all-ages cohort.
pub const TOTAL_COHORT: u8 = 0;

/// The open-ended top cohort (85 and over).
pub const OPEN_COHORT: u8 = 18;

/// Cohorts that partition the age domain.
pub const AGE_BAND_COHORTS: RangeInclusive<u8> = 1..=OPEN_COHORT;

/// Map an age in years to its five-year cohort index.
///
/// The result is not clamped: ages of 90 and above land past the open cohort
/// and are discarded by [`Coverage::span`].
pub fn age_to_cohort(age: u32) -> u32 {
    1 + age / 5
}

/// Human-readable label for a canonical cohort.
pub fn cohort_label(cohort: u8) -> String {
    match cohort {
        TOTAL_COHORT => "total".to_string(),
        OPEN_COHORT => "85+".to_string(),
        c if c < OPEN_COHORT => {
            let lower = (c as u32 - 1) * 5;
            format!("{}-{}", lower, lower + 4)
        }
        c => format!("cohort {}", c),
    }
}

/// The set of canonical cohorts a source age bucket covers.
///
/// Always sorted, deduplicated and restricted to `0..=18`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct Coverage(Vec<u8>);

impl Coverage {
    /// Coverage of nothing.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Coverage of the all-ages cohort only.
    pub fn total() -> Self {
        Self(vec![TOTAL_COHORT])
    }

    /// Cohorts `first..=last`, dropping anything past the open cohort.
    pub fn span(first: u32, last: u32) -> Self {
        let last = last.min(OPEN_COHORT as u32);
        if first > last {
            return Self::empty();
        }
        Self((first..=last).map(|c| c as u8).collect())
    }

    /// Build from arbitrary cohort indices.
    pub fn from_cohorts(cohorts: impl IntoIterator<Item = u8>) -> Self {
        let mut v: Vec<u8> = cohorts.into_iter().filter(|&c| c <= OPEN_COHORT).collect();
        v.sort_unstable();
        v.dedup();
        Self(v)
    }

    pub fn contains(&self, cohort: u8) -> bool {
        self.0.binary_search(&cohort).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<u8>> for Coverage {
    fn from(v: Vec<u8>) -> Self {
        Self::from_cohorts(v)
    }
}

impl From<Coverage> for Vec<u8> {
    fn from(c: Coverage) -> Self {
        c.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_to_cohort() {
        assert_eq!(age_to_cohort(0), 1);
        assert_eq!(age_to_cohort(4), 1);
        assert_eq!(age_to_cohort(5), 2);
        assert_eq!(age_to_cohort(19), 4);
        assert_eq!(age_to_cohort(85), 18);
        assert_eq!(age_to_cohort(90), 19);
    }

    #[test]
    fn test_span_clips_past_open_cohort() {
        assert_eq!(Coverage::span(4, 4).iter().collect::<Vec<_>>(), vec![4]);
        assert_eq!(Coverage::span(17, 20).iter().collect::<Vec<_>>(), vec![17, 18]);
        assert!(Coverage::span(19, 19).is_empty());
        assert!(Coverage::span(5, 3).is_empty());
    }

    #[test]
    fn test_from_cohorts_sorts_and_dedups() {
        let c = Coverage::from_cohorts([3, 1, 3, 25]);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(c.contains(3));
        assert!(!c.contains(25));
    }

    #[test]
    fn test_cohort_label() {
        assert_eq!(cohort_label(0), "total");
        assert_eq!(cohort_label(1), "0-4");
        assert_eq!(cohort_label(10), "45-49");
        assert_eq!(cohort_label(18), "85+");
    }
}
