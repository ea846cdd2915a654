//! Metric rows and the region-indexed metric table.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::numeric::{replace_indeterminate, round_half_even};

/// CRR and ACE for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricPair {
    pub crr: f64,
    pub ace: i64,
}

impl MetricPair {
    /// Compute from daughters `d`, the cohorts bounding the mothers' range
    /// (`bottom`, `top`), and the sum of the cohorts between them.
    ///
    /// `M = middle + (bottom + top) / 2`, `CRR = round(6D / M, 2)` and
    /// `ACE = round((D - top) / 5)`. Non-finite results become zero.
    pub fn compute(d: f64, bottom: f64, top: f64, middle: f64) -> Self {
        let mothers = middle + (bottom + top) / 2.0;
        let crr = replace_indeterminate(round_half_even(d * 6.0 / mothers, 2));
        let ace = replace_indeterminate(round_half_even((d - top) / 5.0, 0));
        Self {
            crr,
            ace: ace as i64,
        }
    }
}

/// Metrics of one region (and year), per canonical category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub year: Option<i32>,
    pub values: IndexMap<String, MetricPair>,
}

impl MetricRow {
    pub fn get(&self, category: &str) -> Option<MetricPair> {
        self.values.get(category).copied()
    }

    /// Formatted cells in column order: every CRR, then every ACE.
    pub fn cells(&self, categories: &[String]) -> Vec<String> {
        let pairs: Vec<MetricPair> = categories
            .iter()
            .map(|c| self.get(c).unwrap_or_default())
            .collect();
        pairs
            .iter()
            .map(|p| format!("{:.2}", p.crr))
            .chain(pairs.iter().map(|p| p.ace.to_string()))
            .collect()
    }
}

/// The region-indexed output of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTable {
    categories: Vec<String>,
    rows: Vec<MetricRow>,
}

impl MetricTable {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            categories,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: MetricRow) {
        self.rows.push(row);
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// `<cat>_CRR` for every category, then `<cat>_ACE`.
    pub fn column_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_CRR", c))
            .chain(self.categories.iter().map(|c| format!("{}_ACE", c)))
            .collect()
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn get(&self, region: &str, year: Option<i32>) -> Option<&MetricRow> {
        self.rows
            .iter()
            .find(|r| r.region == region && r.year == year)
    }

    /// Rows grouped by year, each group in region order.
    pub fn by_year(&self) -> BTreeMap<Option<i32>, Vec<&MetricRow>> {
        let mut groups: BTreeMap<Option<i32>, Vec<&MetricRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.year).or_default().push(row);
        }
        for rows in groups.values_mut() {
            rows.sort_by(|a, b| a.region.cmp(&b.region));
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
