//! Cohort harmonization: source age buckets onto the canonical cohorts.
//!
//! Coverage of each source bucket comes from a [`CoverageSource`]: parsed
//! from free-text labels, given explicitly, or taken as already canonical.
//! The [`CohortResolver`] then picks, for every canonical cohort, the
//! narrowest bucket that covers it, and [`remap`] moves raw records onto the
//! canonical cohorts with an equal split across each bucket's cohorts.

mod label;
mod remap;
mod resolver;

pub use label::parse_label;
pub use remap::{remap, RemapOutcome};
pub use resolver::{
    CanonicalCoverage, CohortAssignment, CohortResolver, CoverageSource, ExplicitCoverage,
    LabelCoverage,
};
