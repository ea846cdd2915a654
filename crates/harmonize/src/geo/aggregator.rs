//! Signed accumulation of leaf rows into composite regions.

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn};

use crate::table::ObservationTable;

use super::rules::ContainmentRules;

/// Counts from one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoStats {
    /// Leaf rows that fed at least one composite.
    pub contributing_rows: usize,
    /// Distinct composite regions produced.
    pub composite_regions: usize,
    /// Composite regions whose identifier was already a leaf region.
    pub collisions: usize,
}

/// Build composite rows from the leaf rows of `table`.
///
/// Leaf rows are visited in key order, so the result does not depend on the
/// order in which the table was filled. A composite row is created on its
/// first contribution; later contributions are added with their sign.
pub fn aggregate(table: &ObservationTable, rules: &dyn ContainmentRules) -> (ObservationTable, usize) {
    let mut composites = ObservationTable::new();
    let mut contributing = 0;

    for (key, row) in table.sorted_rows() {
        let contributions = rules.contributions(&key.region);
        if contributions.is_empty() {
            continue;
        }
        contributing += 1;
        for contribution in contributions {
            composites
                .row_entry(key.with_region(contribution.target))
                .add_scaled(row, contribution.sign.coefficient());
        }
    }

    (composites, contributing)
}

/// Adds composite regions to an observation table in place.
pub struct GeoAggregator<'a> {
    rules: &'a dyn ContainmentRules,
}

impl<'a> GeoAggregator<'a> {
    pub fn new(rules: &'a dyn ContainmentRules) -> Self {
        Self { rules }
    }

    /// Aggregate and merge composites into `table`.
    ///
    /// A composite whose identifier collides with a leaf region is added to
    /// the leaf's counts; the collision is logged.
    pub fn apply(&self, table: &mut ObservationTable) -> GeoStats {
        let _span = info_span!("geo_aggregate", rows = table.len()).entered();

        let (composites, contributing_rows) = aggregate(table, self.rules);

        let leaves = table.regions();
        let composite_regions = composites.regions();
        let collisions = composite_regions
            .iter()
            .filter(|region| leaves.contains(*region))
            .inspect(|region| warn!(region = %region, "composite region collides with a leaf region"))
            .count();

        let stats = GeoStats {
            contributing_rows,
            composite_regions: composite_regions.len(),
            collisions,
        };

        table.merge(composites);
        debug!(
            contributing_rows = stats.contributing_rows,
            composite_regions = stats.composite_regions,
            "geo aggregation complete"
        );
        stats
    }

    /// Whether a region is a fragment to be left out of metric output.
    pub fn is_fragment(&self, region: &str) -> bool {
        self.rules.is_fragment(region)
    }
}
