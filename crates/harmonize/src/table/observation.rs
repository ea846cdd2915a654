//! In-memory observation table keyed by region, year, cohort and sex.
//!
//! A table maps a [`RowKey`] to a [`Row`], and a row maps category codes to
//! counts. Categories are source codes straight after ingestion and canonical
//! codes once apportionment has run; the table itself does not care which.

use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::schema::Sex;

/// Identifies one row: every category count shares this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub year: Option<i32>,
    pub cohort: u8,
    pub sex: Sex,
}

impl RowKey {
    pub fn new(region: impl Into<String>, year: Option<i32>, cohort: u8, sex: Sex) -> Self {
        Self {
            region: region.into(),
            year,
            cohort,
            sex,
        }
    }

    /// The same key moved to another region.
    pub fn with_region(&self, region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..self.clone()
        }
    }

    /// The same key moved to another cohort.
    pub fn with_cohort(&self, cohort: u8) -> Self {
        Self {
            cohort,
            ..self.clone()
        }
    }
}

/// Category counts for one row, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, f64>);

impl Row {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Count for a category, zero when absent.
    pub fn get(&self, category: &str) -> f64 {
        self.0.get(category).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.0.contains_key(category)
    }

    /// Overwrite a category count, returning the previous one.
    pub fn set(&mut self, category: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(category.into(), value)
    }

    /// Add to a category count, creating it at zero first.
    pub fn add(&mut self, category: impl Into<String>, value: f64) {
        *self.0.entry(category.into()).or_insert(0.0) += value;
    }

    /// Add `coefficient * other` elementwise.
    pub fn add_scaled(&mut self, other: &Row, coefficient: f64) {
        for (category, value) in &other.0 {
            self.add(category.clone(), value * coefficient);
        }
    }

    /// Sum of the given categories.
    pub fn sum_of<'a>(&self, categories: impl IntoIterator<Item = &'a str>) -> f64 {
        categories.into_iter().map(|c| self.get(c)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.0.values_mut()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Counts of values rewritten by [`ObservationTable::sanitize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeReport {
    /// NaN or infinite values replaced with zero.
    pub non_finite: usize,
    /// Negative values clamped to zero.
    pub negative: usize,
}

/// The shared observation table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    rows: IndexMap<RowKey, Row>,
}

impl ObservationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            rows: IndexMap::new(),
        }
    }

    /// Write a count, overwriting any previous value for the same key.
    pub fn insert(&mut self, key: RowKey, category: impl Into<String>, value: f64) -> Option<f64> {
        self.row_entry(key).set(category, value)
    }

    /// Add to a count, starting from zero when the key is new.
    pub fn accumulate(&mut self, key: RowKey, category: impl Into<String>, value: f64) {
        self.row_entry(key).add(category, value);
    }

    /// Get a single count.
    pub fn get(&self, key: &RowKey, category: &str) -> Option<f64> {
        self.rows.get(key).and_then(|r| r.0.get(category).copied())
    }

    pub fn row(&self, key: &RowKey) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Get a row, creating it empty on first use.
    pub fn row_entry(&mut self, key: RowKey) -> &mut Row {
        self.rows.entry(key).or_default()
    }

    /// Replace a whole row.
    pub fn set_row(&mut self, key: RowKey, row: Row) -> Option<Row> {
        self.rows.insert(key, row)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&RowKey, &Row)> {
        self.rows.iter()
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = (&RowKey, &mut Row)> {
        self.rows.iter_mut()
    }

    /// Rows in key order (region, year, cohort, sex).
    pub fn sorted_rows(&self) -> Vec<(&RowKey, &Row)> {
        let mut rows: Vec<_> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Keep only the rows matching a predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&RowKey, &Row) -> bool) {
        self.rows.retain(|k, r| keep(k, r));
    }

    /// Accumulate every count of another table into this one.
    pub fn merge(&mut self, other: ObservationTable) {
        for (key, row) in other.rows {
            match self.rows.get_mut(&key) {
                Some(existing) => existing.add_scaled(&row, 1.0),
                None => {
                    self.rows.insert(key, row);
                }
            }
        }
    }

    /// Replace non-finite counts with zero and clamp negatives to zero.
    pub fn sanitize(&mut self) -> SanitizeReport {
        let mut report = SanitizeReport::default();
        for row in self.rows.values_mut() {
            for value in row.values_mut() {
                if !value.is_finite() {
                    *value = 0.0;
                    report.non_finite += 1;
                } else if *value < 0.0 {
                    *value = 0.0;
                    report.negative += 1;
                }
            }
        }
        report
    }

    /// Distinct region identifiers, sorted.
    pub fn regions(&self) -> BTreeSet<&str> {
        self.rows.keys().map(|k| k.region.as_str()).collect()
    }

    /// Distinct category codes in first-seen order.
    pub fn categories(&self) -> IndexSet<String> {
        let mut seen = IndexSet::new();
        for row in self.rows.values() {
            for category in row.categories() {
                if !seen.contains(category) {
                    seen.insert(category.to_string());
                }
            }
        }
        seen
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of individual counts across all rows.
    pub fn observation_count(&self) -> usize {
        self.rows.values().map(Row::len).sum()
    }
}

impl FromIterator<(RowKey, Row)> for ObservationTable {
    fn from_iter<I: IntoIterator<Item = (RowKey, Row)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ObservationTable {
    type Item = (RowKey, Row);
    type IntoIter = indexmap::map::IntoIter<RowKey, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(region: &str, cohort: u8) -> RowKey {
        RowKey::new(region, None, cohort, Sex::Female)
    }

    #[test]
    fn test_insert_overwrites_accumulate_adds() {
        let mut table = ObservationTable::new();
        table.insert(key("01", 1), "W", 10.0);
        let previous = table.insert(key("01", 1), "W", 12.0);
        assert_eq!(previous, Some(10.0));
        assert_eq!(table.get(&key("01", 1), "W"), Some(12.0));

        table.accumulate(key("01", 1), "W", 3.0);
        table.accumulate(key("01", 2), "B", 4.0);
        assert_eq!(table.get(&key("01", 1), "W"), Some(15.0));
        assert_eq!(table.get(&key("01", 2), "B"), Some(4.0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.observation_count(), 2);
    }

    #[test]
    fn test_merge_accumulates_shared_keys() {
        let mut a = ObservationTable::new();
        a.insert(key("R35", 1), "E", 5.0);
        let mut b = ObservationTable::new();
        b.insert(key("R35", 1), "E", 2.5);
        b.insert(key("R35", 2), "E", 1.0);

        a.merge(b);
        assert_eq!(a.get(&key("R35", 1), "E"), Some(7.5));
        assert_eq!(a.get(&key("R35", 2), "E"), Some(1.0));
    }

    #[test]
    fn test_sanitize_replaces_indeterminate_and_negative() {
        let mut table = ObservationTable::new();
        table.insert(key("01", 1), "W", f64::NAN);
        table.insert(key("01", 1), "B", f64::INFINITY);
        table.insert(key("01", 1), "R", -0.5);
        table.insert(key("01", 1), "Y", 3.0);

        let report = table.sanitize();
        assert_eq!(report.non_finite, 2);
        assert_eq!(report.negative, 1);
        let row = table.row(&key("01", 1)).unwrap();
        assert_eq!(row.sum_of(["W", "B", "R", "Y"]), 3.0);
    }

    #[test]
    fn test_regions_and_categories() {
        let mut table = ObservationTable::new();
        table.insert(key("35", 1), "B", 1.0);
        table.insert(key("10", 1), "W", 1.0);
        table.insert(key("10", 2), "B", 1.0);

        assert_eq!(table.regions().into_iter().collect::<Vec<_>>(), vec!["10", "35"]);
        assert_eq!(
            table.categories().into_iter().collect::<Vec<_>>(),
            vec!["B".to_string(), "W".to_string()]
        );
    }

    #[test]
    fn test_sorted_rows_orders_by_region_then_cohort() {
        let mut table = ObservationTable::new();
        table.insert(key("B", 2), "E", 1.0);
        table.insert(key("A", 3), "E", 1.0);
        table.insert(key("A", 1), "E", 1.0);

        let order: Vec<_> = table
            .sorted_rows()
            .into_iter()
            .map(|(k, _)| (k.region.clone(), k.cohort))
            .collect();
        assert_eq!(
            order,
            vec![("A".to_string(), 1), ("A".to_string(), 3), ("B".to_string(), 2)]
        );
    }
}
