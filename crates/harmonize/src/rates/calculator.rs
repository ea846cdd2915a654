//! CRR/ACE over female cohort rows.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::schema::{CategorySet, Sex, COHORT_COUNT};
use crate::table::{ObservationTable, Row};

use super::metrics::{MetricPair, MetricRow, MetricTable};

/// Daughters: ages 0-4.
const DAUGHTERS: u8 = 1;
/// Lower edge of the mothers' range: ages 15-19, counted half.
const MOTHERS_BOTTOM: u8 = 4;
/// Upper edge of the mothers' range: ages 45-49, counted half.
const MOTHERS_TOP: u8 = 10;

/// Cohorts that must all be present for a region/year to be rated.
fn required_cohorts() -> impl Iterator<Item = u8> {
    [DAUGHTERS].into_iter().chain(MOTHERS_BOTTOM..=MOTHERS_TOP)
}

/// Counts from one rate pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateStats {
    pub rated: usize,
    /// Region/years skipped for missing cohorts.
    pub incomplete: usize,
    /// Region/years skipped as fragments.
    pub fragments: usize,
}

/// Computes the metric table from a harmonized observation table.
#[derive(Debug, Clone)]
pub struct RateCalculator {
    categories: CategorySet,
}

impl RateCalculator {
    pub fn new(categories: CategorySet) -> Self {
        Self { categories }
    }

    /// Rate every female region/year of `table`.
    ///
    /// Regions for which `is_fragment` holds are skipped. A region/year
    /// lacking any of cohorts 1, 4-10 is skipped and counted. A category
    /// missing from a present row counts as zero.
    pub fn compute(
        &self,
        table: &ObservationTable,
        is_fragment: impl Fn(&str) -> bool,
    ) -> (MetricTable, RateStats) {
        let _span = info_span!("rates", rows = table.len()).entered();

        let mut groups: BTreeMap<(&str, Option<i32>), [Option<&Row>; COHORT_COUNT]> =
            BTreeMap::new();
        for (key, row) in table.rows() {
            if key.sex != Sex::Female {
                continue;
            }
            if let Some(slot) = groups
                .entry((key.region.as_str(), key.year))
                .or_insert([None; COHORT_COUNT])
                .get_mut(key.cohort as usize)
            {
                *slot = Some(row);
            }
        }

        let mut stats = RateStats::default();
        let mut metrics = MetricTable::new(self.categories.codes.clone());

        for ((region, year), cohorts) in groups {
            if is_fragment(region) {
                stats.fragments += 1;
                continue;
            }
            if let Some(missing) = required_cohorts().find(|c| cohorts[*c as usize].is_none()) {
                debug!(region, year = ?year, cohort = missing, "incomplete cohort coverage, skipping");
                stats.incomplete += 1;
                continue;
            }

            let cohort = |c: u8, category: &str| cohorts[c as usize].map_or(0.0, |r| r.get(category));
            let values: IndexMap<String, MetricPair> = self
                .categories
                .codes
                .iter()
                .map(|category| {
                    let middle: f64 = (MOTHERS_BOTTOM + 1..MOTHERS_TOP)
                        .map(|c| cohort(c, category))
                        .sum();
                    let pair = MetricPair::compute(
                        cohort(DAUGHTERS, category),
                        cohort(MOTHERS_BOTTOM, category),
                        cohort(MOTHERS_TOP, category),
                        middle,
                    );
                    (category.clone(), pair)
                })
                .collect();

            metrics.push(MetricRow {
                region: region.to_string(),
                year,
                values,
            });
            stats.rated += 1;
        }

        debug!(
            rated = stats.rated,
            incomplete = stats.incomplete,
            fragments = stats.fragments,
            "rates computed"
        );
        (metrics, stats)
    }
}
