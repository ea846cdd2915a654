//! Assignment of canonical cohorts to source age buckets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarmonizeError, Result};
use crate::schema::{Coverage, OPEN_COHORT, TOTAL_COHORT};

use super::label::parse_label;

/// Supplies the coverage of every source bucket, in declaration order.
pub trait CoverageSource {
    fn coverage(&self) -> Vec<(String, Coverage)>;
}

/// Coverage parsed from free-text labels such as `"15 to 19 years"`.
#[derive(Debug, Clone, Default)]
pub struct LabelCoverage {
    labels: IndexMap<String, String>,
}

impl LabelCoverage {
    pub fn new(labels: IndexMap<String, String>) -> Self {
        Self { labels }
    }
}

impl FromIterator<(String, String)> for LabelCoverage {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl CoverageSource for LabelCoverage {
    fn coverage(&self) -> Vec<(String, Coverage)> {
        self.labels
            .iter()
            .map(|(bucket, label)| (bucket.clone(), parse_label(label)))
            .collect()
    }
}

/// Coverage sets given directly.
#[derive(Debug, Clone, Default)]
pub struct ExplicitCoverage {
    sets: IndexMap<String, Coverage>,
}

impl ExplicitCoverage {
    pub fn new(sets: IndexMap<String, Coverage>) -> Self {
        Self { sets }
    }
}

impl CoverageSource for ExplicitCoverage {
    fn coverage(&self) -> Vec<(String, Coverage)> {
        self.sets
            .iter()
            .map(|(bucket, coverage)| (bucket.clone(), coverage.clone()))
            .collect()
    }
}

/// Sources whose buckets are already canonical cohort indices `"0"`..`"18"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalCoverage;

impl CoverageSource for CanonicalCoverage {
    fn coverage(&self) -> Vec<(String, Coverage)> {
        (TOTAL_COHORT..=OPEN_COHORT)
            .map(|c| (c.to_string(), Coverage::from_cohorts([c])))
            .collect()
    }
}

/// The chosen source bucket for every canonical cohort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortAssignment {
    /// Canonical cohort -> source bucket.
    by_cohort: IndexMap<u8, String>,
    /// Source bucket -> canonical cohorts it was chosen for.
    by_bucket: IndexMap<String, Vec<u8>>,
    /// Coverage of every declared bucket.
    coverage: IndexMap<String, Coverage>,
    /// Whether cohort 0 is summed from cohorts 1..=18 after remapping.
    derived_total: bool,
}

impl CohortAssignment {
    /// Source bucket chosen for a canonical cohort.
    pub fn bucket_for(&self, cohort: u8) -> Option<&str> {
        self.by_cohort.get(&cohort).map(String::as_str)
    }

    /// Canonical cohorts a source bucket was chosen for (empty if none).
    pub fn cohorts_for(&self, bucket: &str) -> &[u8] {
        self.by_bucket.get(bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Coverage derived for a declared bucket.
    pub fn coverage_of(&self, bucket: &str) -> Option<&Coverage> {
        self.coverage.get(bucket)
    }

    pub fn derived_total(&self) -> bool {
        self.derived_total
    }

    /// `(cohort, bucket)` pairs in cohort order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.by_cohort.iter().map(|(c, b)| (*c, b.as_str()))
    }

    /// Declared buckets that no cohort was assigned to.
    pub fn unused_buckets(&self) -> impl Iterator<Item = &str> {
        self.coverage
            .keys()
            .filter(|b| !self.by_bucket.contains_key(*b))
            .map(String::as_str)
    }
}

/// Resolves a source bucketing against the canonical cohort schema.
#[derive(Debug, Clone, Default)]
pub struct CohortResolver {
    derive_total: bool,
}

impl CohortResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow sources without an all-ages bucket; cohort 0 is then summed
    /// from the age bands after remapping.
    pub fn with_derived_total(mut self, derive_total: bool) -> Self {
        self.derive_total = derive_total;
        self
    }

    /// Pick the narrowest covering bucket for each canonical cohort.
    ///
    /// Ties go to the bucket declared first. Fails with
    /// [`HarmonizeError::MappingGap`] when some cohort has no candidate.
    pub fn resolve(&self, source: &dyn CoverageSource) -> Result<CohortAssignment> {
        let buckets = source.coverage();
        let mut assignment = CohortAssignment {
            coverage: buckets.iter().cloned().collect(),
            ..CohortAssignment::default()
        };

        for cohort in TOTAL_COHORT..=OPEN_COHORT {
            let chosen = buckets
                .iter()
                .filter(|(_, coverage)| coverage.contains(cohort))
                .min_by_key(|(_, coverage)| coverage.len());

            match chosen {
                Some((bucket, _)) => {
                    assignment.by_cohort.insert(cohort, bucket.clone());
                    assignment
                        .by_bucket
                        .entry(bucket.clone())
                        .or_default()
                        .push(cohort);
                }
                None if cohort == TOTAL_COHORT && self.derive_total => {
                    debug!("no all-ages bucket; cohort 0 will be derived");
                    assignment.derived_total = true;
                }
                None => return Err(HarmonizeError::MappingGap { cohort }),
            }
        }

        Ok(assignment)
    }
}
