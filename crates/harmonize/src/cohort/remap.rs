//! Moving raw records onto canonical cohorts.

use tracing::{debug, trace};

use crate::input::RawRecord;
use crate::schema::{AGE_BAND_COHORTS, TOTAL_COHORT};
use crate::table::{ObservationTable, RowKey};

use super::resolver::CohortAssignment;

/// Result of remapping a record set.
#[derive(Debug, Clone, Default)]
pub struct RemapOutcome {
    pub table: ObservationTable,
    /// Records whose bucket was never chosen for any cohort.
    pub unassigned: usize,
    /// Writes that replaced an earlier record for the same key.
    pub overwritten: usize,
}

/// Split every record evenly over the cohorts assigned to its bucket.
///
/// A bucket chosen for three cohorts contributes a third of its count to
/// each. Later records for the same key overwrite earlier ones.
pub fn remap(
    records: impl IntoIterator<Item = RawRecord>,
    assignment: &CohortAssignment,
) -> RemapOutcome {
    let mut outcome = RemapOutcome::default();

    for record in records {
        let cohorts = assignment.cohorts_for(&record.bucket);
        if cohorts.is_empty() {
            trace!(bucket = %record.bucket, "record bucket not assigned to any cohort");
            outcome.unassigned += 1;
            continue;
        }

        let share = record.value / cohorts.len() as f64;
        for &cohort in cohorts {
            let key = RowKey::new(record.region.as_str(), record.year, cohort, record.sex);
            if outcome
                .table
                .insert(key, record.category.as_str(), share)
                .is_some()
            {
                outcome.overwritten += 1;
            }
        }
    }

    if assignment.derived_total() {
        derive_total_cohort(&mut outcome.table);
    }

    debug!(
        rows = outcome.table.len(),
        unassigned = outcome.unassigned,
        overwritten = outcome.overwritten,
        "remapped records onto canonical cohorts"
    );
    outcome
}

/// Sum the age-band cohorts into cohort 0.
fn derive_total_cohort(table: &mut ObservationTable) {
    let mut totals = ObservationTable::new();
    for (key, row) in table.rows() {
        if AGE_BAND_COHORTS.contains(&key.cohort) {
            totals
                .row_entry(key.with_cohort(TOTAL_COHORT))
                .add_scaled(row, 1.0);
        }
    }
    table.merge(totals);
}
