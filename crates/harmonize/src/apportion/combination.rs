//! Combination-frequency apportionment of multi-response counts.
//!
//! Sources that let people report more than one race publish, per race,
//! an "alone" count and an "alone or in combination" count, plus a single
//! "two or more" count. The two-or-more count is shared out across races in
//! proportion to how often each race is reported in combination.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::numeric::checked_ratio;
use crate::table::ObservationTable;

use super::ApportionStats;

/// Key layout of a combination-reporting source.
///
/// Keys are built as `{group}{race}{suffix}`; the multi-response key is
/// `{group}{multiple}`. With the defaults, `NHWA` is non-Hispanic white
/// alone, `NHWAC` white alone or in combination, `NHTOM` two or more races,
/// and the derived total is written to `NHWT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationSpec {
    /// Outer groups, e.g. Hispanic and non-Hispanic.
    pub groups: Vec<String>,
    pub races: Vec<String>,
    #[serde(default = "default_alone")]
    pub alone_suffix: String,
    #[serde(default = "default_combined")]
    pub combined_suffix: String,
    #[serde(default = "default_multiple")]
    pub multiple: String,
    #[serde(default = "default_output")]
    pub output_suffix: String,
}

fn default_alone() -> String {
    "A".to_string()
}

fn default_combined() -> String {
    "AC".to_string()
}

fn default_multiple() -> String {
    "TOM".to_string()
}

fn default_output() -> String {
    "T".to_string()
}

impl CombinationSpec {
    pub fn new(
        groups: impl IntoIterator<Item = impl Into<String>>,
        races: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
            races: races.into_iter().map(Into::into).collect(),
            alone_suffix: default_alone(),
            combined_suffix: default_combined(),
            multiple: default_multiple(),
            output_suffix: default_output(),
        }
    }

    fn key(&self, group: &str, race: &str, suffix: &str) -> String {
        format!("{}{}{}", group, race, suffix)
    }
}

/// Write `{group}{race}{output}` for every group and race.
///
/// `C = combined - alone`, `add = multiple / sum(C)` (zero when
/// indeterminate), and the output is `alone + C * add`. Summed over races the
/// outputs equal `sum(alone) + multiple` whenever some race is reported in
/// combination.
pub fn apply_combination(table: &mut ObservationTable, spec: &CombinationSpec) -> ApportionStats {
    let mut stats = ApportionStats::default();

    for (key, row) in table.rows_mut() {
        for group in &spec.groups {
            let alone: Vec<f64> = spec
                .races
                .iter()
                .map(|r| row.get(&spec.key(group, r, &spec.alone_suffix)))
                .collect();
            let in_combination: Vec<f64> = spec
                .races
                .iter()
                .zip(&alone)
                .map(|(r, a)| row.get(&spec.key(group, r, &spec.combined_suffix)) - a)
                .collect();

            let total_in_combination: f64 = in_combination.iter().sum();
            let multiple = row.get(&format!("{}{}", group, spec.multiple));
            let add = match checked_ratio(multiple, total_in_combination) {
                Some(add) => add,
                None => {
                    trace!(region = %key.region, group = %group, "no in-combination responses");
                    stats.indeterminate += 1;
                    0.0
                }
            };

            for ((race, a), c) in spec.races.iter().zip(&alone).zip(&in_combination) {
                row.set(spec.key(group, race, &spec.output_suffix), a + c * add);
            }
        }
        stats.rows += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Sex;
    use crate::table::RowKey;

    fn key() -> RowKey {
        RowKey::new("06037", Some(2015), 5, Sex::Female)
    }

    fn spec() -> CombinationSpec {
        CombinationSpec::new(["NH"], ["W", "B", "A"])
    }

    #[test]
    fn test_multiple_shared_by_combination_frequency() {
        let mut table = ObservationTable::new();
        for (cat, v) in [
            ("NHWA", 100.0),
            ("NHWAC", 130.0),
            ("NHBA", 50.0),
            ("NHBAC", 60.0),
            ("NHAA", 20.0),
            ("NHAAC", 30.0),
            ("NHTOM", 25.0),
        ] {
            table.insert(key(), cat, v);
        }

        let stats = apply_combination(&mut table, &spec());
        assert_eq!(stats.indeterminate, 0);

        // in combination: W 30, B 10, A 10 -> add = 25 / 50 = 0.5
        let row = table.row(&key()).unwrap();
        assert_eq!(row.get("NHWT"), 115.0);
        assert_eq!(row.get("NHBT"), 55.0);
        assert_eq!(row.get("NHAT"), 25.0);
        assert_eq!(row.sum_of(["NHWT", "NHBT", "NHAT"]), 170.0 + 25.0);
    }

    #[test]
    fn test_no_combination_responses_contribute_nothing() {
        let mut table = ObservationTable::new();
        for (cat, v) in [("NHWA", 10.0), ("NHWAC", 10.0), ("NHTOM", 4.0)] {
            table.insert(key(), cat, v);
        }

        let stats = apply_combination(&mut table, &spec());
        assert_eq!(stats.indeterminate, 1);
        let row = table.row(&key()).unwrap();
        assert_eq!(row.get("NHWT"), 10.0);
        assert!(row.get("NHBT").is_finite());
    }

    #[test]
    fn test_spec_defaults_from_json() {
        let spec: CombinationSpec =
            serde_json::from_str(r#"{"groups": ["H", "NH"], "races": ["W", "B"]}"#).unwrap();
        assert_eq!(spec.alone_suffix, "A");
        assert_eq!(spec.combined_suffix, "AC");
        assert_eq!(spec.multiple, "TOM");
        assert_eq!(spec.output_suffix, "T");
    }
}
