//! Ratio-derived apportionment.
//!
//! Two shapes of the same idea: a residual ("not stated", "not elsewhere
//! classified") is spread over the specified categories in proportion to
//! their size, by scaling with `total / sum(specified)`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{HarmonizeError, Result};
use crate::numeric::checked_ratio;
use crate::schema::CategorySet;
use crate::table::{ObservationTable, Row};

use super::ApportionStats;

/// A weighted source key in a group subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub key: String,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

impl Term {
    pub fn new(key: impl Into<String>, weight: f64) -> Self {
        Self {
            key: key.into(),
            weight,
        }
    }
}

/// One level of a response hierarchy and the sublevels nested under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationLevel {
    pub level: String,
    pub sublevels: Vec<String>,
}

/// Scale each level's sublevels so the specified ones sum to the level.
///
/// For every row and level, `ratio = level / sum(specified sublevels)` and
/// every sublevel, unspecified ones included, is multiplied by `ratio`. An
/// indeterminate ratio is replaced with zero. Levels run in order, so a
/// parent must be listed before its children.
pub fn normalize_levels(
    table: &mut ObservationTable,
    levels: &[NormalizationLevel],
    unspecified: &[String],
) -> ApportionStats {
    let mut stats = ApportionStats::default();

    for (key, row) in table.rows_mut() {
        for level in levels {
            let specified = level
                .sublevels
                .iter()
                .filter(|s| !unspecified.contains(*s))
                .map(|s| row.get(s))
                .sum::<f64>();

            let ratio = match checked_ratio(row.get(&level.level), specified) {
                Some(r) => r,
                None => {
                    trace!(region = %key.region, level = %level.level, "indeterminate normalization ratio");
                    stats.indeterminate += 1;
                    0.0
                }
            };

            for sub in &level.sublevels {
                if row.contains(sub) {
                    let scaled = row.get(sub) * ratio;
                    row.set(sub.as_str(), scaled);
                }
            }
        }
        stats.rows += 1;
    }

    stats
}

/// Canonical categories as scaled signed subtotals of source keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioGroups {
    /// Source key holding the grand total.
    pub total_key: String,
    /// Source keys whose sum is the denominator.
    pub specified: Vec<String>,
    /// Canonical category -> terms of its subtotal.
    pub groups: IndexMap<String, Vec<Term>>,
}

impl RatioGroups {
    /// Reject groups naming categories outside the canonical set.
    pub fn validate(&self, categories: &CategorySet) -> Result<()> {
        for category in self.groups.keys() {
            if !categories.contains(category) {
                return Err(HarmonizeError::Config(format!(
                    "ratio group '{}' is not a canonical category",
                    category
                )));
            }
            if *category == categories.total {
                return Err(HarmonizeError::Config(format!(
                    "ratio group '{}' is the total category, which is taken from '{}'",
                    category, self.total_key
                )));
            }
        }
        if self.specified.is_empty() {
            return Err(HarmonizeError::Config(
                "ratio mapping has no specified categories".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replace every row with `coefficient * subtotal` per canonical group.
///
/// `coefficient = row[total_key] / sum(row[specified])`. When that is
/// indeterminate the grand total is split evenly over the disjoint canonical
/// categories instead. The total category always receives the grand total.
pub fn apply_ratio_groups(
    table: &mut ObservationTable,
    groups: &RatioGroups,
    categories: &CategorySet,
) -> ApportionStats {
    let mut stats = ApportionStats::default();
    let disjoint = categories.disjoint_count() as f64;

    for (key, row) in table.rows_mut() {
        let grand_total = row.get(&groups.total_key);
        let specified = row.sum_of(groups.specified.iter().map(String::as_str));

        let mut canonical: Row = categories.codes.iter().map(|c| (c.clone(), 0.0)).collect();
        canonical.set(categories.total.as_str(), grand_total);

        match checked_ratio(grand_total, specified) {
            Some(coefficient) => {
                for (category, terms) in &groups.groups {
                    let subtotal: f64 = terms.iter().map(|t| t.weight * row.get(&t.key)).sum();
                    canonical.set(category.as_str(), coefficient * subtotal);
                }
            }
            None => {
                trace!(region = %key.region, cohort = key.cohort, "even split fallback");
                stats.indeterminate += 1;
                stats.fallback_rows += 1;
                let share = grand_total / disjoint;
                for category in categories.disjoint() {
                    canonical.set(category, share);
                }
            }
        }

        *row = canonical;
        stats.rows += 1;
    }

    stats
}
