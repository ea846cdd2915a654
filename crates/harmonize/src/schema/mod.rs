//! Canonical schema the pipeline harmonizes every source into.

mod category;
mod cohort;
mod types;

pub use category::CategorySet;
pub use cohort::{
    age_to_cohort, cohort_label, Coverage, AGE_BAND_COHORTS, COHORT_COUNT, OPEN_COHORT,
    TOTAL_COHORT,
};
pub use types::Sex;
