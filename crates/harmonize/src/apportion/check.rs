//! Declared category set check.

use tracing::error;

use crate::error::{HarmonizeError, Result};
use crate::table::ObservationTable;

/// Fail unless the table's categories are exactly the declared ones.
///
/// Run before any apportionment: a renamed or new source category would
/// otherwise be dropped or misallocated without notice.
pub fn check_declared_categories(table: &ObservationTable, declared: &[String]) -> Result<()> {
    let present = table.categories();

    let missing: Vec<String> = declared
        .iter()
        .filter(|c| !present.contains(c.as_str()))
        .cloned()
        .collect();
    let unexpected: Vec<String> = present
        .iter()
        .filter(|c| !declared.contains(*c))
        .cloned()
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }

    error!(
        missing = missing.len(),
        unexpected = unexpected.len(),
        "source categories do not match declared categories"
    );
    Err(HarmonizeError::SchemaMismatch {
        missing,
        unexpected,
    })
}
