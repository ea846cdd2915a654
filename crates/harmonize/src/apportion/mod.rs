//! Category harmonization: source categories into canonical ones.
//!
//! A source's categories are first prepared by zero or more
//! [`ApportionStep`]s that rewrite source counts in place (response
//! normalization, combination-frequency splitting), then collapsed into the
//! canonical [`CategorySet`](crate::schema::CategorySet) by exactly one
//! [`CanonicalMapping`].

mod check;
mod combination;
mod ratio;
mod weights;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::error::Result;
use crate::schema::CategorySet;
use crate::table::ObservationTable;

pub use check::check_declared_categories;
pub use combination::{apply_combination, CombinationSpec};
pub use ratio::{apply_ratio_groups, normalize_levels, NormalizationLevel, RatioGroups, Term};
pub use weights::{apply_static, CategoryWeightMap, StaticMapping, Weight};

/// Counters collected while apportioning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApportionStats {
    /// Rows processed.
    pub rows: usize,
    /// Divisions whose result was NaN or infinite and replaced.
    pub indeterminate: usize,
    /// Rows that fell back to an even split.
    pub fallback_rows: usize,
}

impl ApportionStats {
    pub fn absorb(&mut self, other: ApportionStats) {
        self.rows = self.rows.max(other.rows);
        self.indeterminate += other.indeterminate;
        self.fallback_rows += other.fallback_rows;
    }
}

/// A rewrite of source counts applied before the canonical mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApportionStep {
    /// Scale multi-response sublevels so they sum to their level total.
    Normalize {
        levels: Vec<NormalizationLevel>,
        /// Sublevels excluded from the denominator ("not stated" and the like).
        #[serde(default)]
        unspecified: Vec<String>,
    },
    /// Split "two or more" counts by in-combination frequency.
    Combination(CombinationSpec),
}

/// How prepared source counts become canonical counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalMapping {
    /// Fixed per-category weights.
    Static(StaticMapping),
    /// `grand_total / sum(specified)` times signed group subtotals.
    Ratio(RatioGroups),
}

/// Runs the configured steps and mapping over a table.
#[derive(Debug, Clone)]
pub struct Apportioner {
    categories: CategorySet,
    steps: Vec<ApportionStep>,
    mapping: ResolvedMapping,
}

#[derive(Debug, Clone)]
enum ResolvedMapping {
    Static(CategoryWeightMap),
    Ratio(RatioGroups),
}

impl Apportioner {
    /// Validate the configuration against the canonical categories.
    pub fn new(
        categories: CategorySet,
        steps: Vec<ApportionStep>,
        mapping: CanonicalMapping,
    ) -> Result<Self> {
        categories.validate()?;
        let mapping = match mapping {
            CanonicalMapping::Static(spec) => {
                ResolvedMapping::Static(CategoryWeightMap::from_mapping(&spec, &categories)?)
            }
            CanonicalMapping::Ratio(groups) => {
                groups.validate(&categories)?;
                ResolvedMapping::Ratio(groups)
            }
        };
        Ok(Self {
            categories,
            steps,
            mapping,
        })
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// Rewrite every row of the table into canonical categories.
    pub fn apply(&self, table: &mut ObservationTable) -> ApportionStats {
        let _span = info_span!("apportion", rows = table.len()).entered();
        let mut stats = ApportionStats::default();

        for step in &self.steps {
            let step_stats = match step {
                ApportionStep::Normalize {
                    levels,
                    unspecified,
                } => normalize_levels(table, levels, unspecified),
                ApportionStep::Combination(spec) => apply_combination(table, spec),
            };
            stats.absorb(step_stats);
        }

        let mapped = match &self.mapping {
            ResolvedMapping::Static(map) => apply_static(table, map, &self.categories),
            ResolvedMapping::Ratio(groups) => apply_ratio_groups(table, groups, &self.categories),
        };
        stats.absorb(mapped);

        debug!(
            indeterminate = stats.indeterminate,
            fallback_rows = stats.fallback_rows,
            "apportioned categories"
        );
        stats
    }
}
