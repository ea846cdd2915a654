//! Static category weight maps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{HarmonizeError, Result};
use crate::schema::CategorySet;
use crate::table::{ObservationTable, Row};

use super::ApportionStats;

/// Configuration form of a static mapping.
///
/// `codes` maps a source category to a string of one-letter canonical codes
/// shared equally (`"WY"` gives half to `W` and half to `Y`). `weights`
/// gives explicit per-category weights. Both may be used together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticMapping {
    #[serde(default)]
    pub codes: IndexMap<String, String>,
    #[serde(default)]
    pub weights: IndexMap<String, IndexMap<String, f64>>,
}

/// One canonical share of a source category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub category: String,
    pub weight: f64,
}

/// Source category -> weighted canonical categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryWeightMap {
    weights: IndexMap<String, Vec<Weight>>,
}

impl CategoryWeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a weighted target for a source category.
    pub fn insert(&mut self, source: impl Into<String>, category: impl Into<String>, weight: f64) {
        self.weights.entry(source.into()).or_default().push(Weight {
            category: category.into(),
            weight,
        });
    }

    /// Build from configuration, rejecting targets outside the canonical set.
    pub fn from_mapping(spec: &StaticMapping, categories: &CategorySet) -> Result<Self> {
        let mut map = Self::new();

        for (source, code) in &spec.codes {
            let letters: Vec<String> = code.chars().map(|c| c.to_string()).collect();
            if letters.is_empty() {
                return Err(HarmonizeError::Config(format!(
                    "source category '{}' maps to an empty code",
                    source
                )));
            }
            let weight = 1.0 / letters.len() as f64;
            for letter in letters {
                map.insert(source.as_str(), letter, weight);
            }
        }

        for (source, targets) in &spec.weights {
            for (category, weight) in targets {
                map.insert(source.as_str(), category.as_str(), *weight);
            }
        }

        for (source, targets) in &map.weights {
            for target in targets {
                if !categories.contains(&target.category) {
                    return Err(HarmonizeError::Config(format!(
                        "source category '{}' maps to unknown canonical category '{}'",
                        source, target.category
                    )));
                }
            }
        }

        Ok(map)
    }

    pub fn get(&self, source: &str) -> Option<&[Weight]> {
        self.weights.get(source).map(Vec::as_slice)
    }

    /// Source categories with at least one target.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Replace every row with its weighted canonical counts.
///
/// Source categories without weights are dropped. Every canonical category
/// is present in the result, at zero if nothing mapped to it.
pub fn apply_static(
    table: &mut ObservationTable,
    map: &CategoryWeightMap,
    categories: &CategorySet,
) -> ApportionStats {
    let mut stats = ApportionStats::default();

    for (_, row) in table.rows_mut() {
        let mut canonical: Row = categories.codes.iter().map(|c| (c.clone(), 0.0)).collect();
        for (source, value) in row.iter() {
            if let Some(weights) = map.get(source) {
                for w in weights {
                    canonical.add(w.category.as_str(), value * w.weight);
                }
            }
        }
        *row = canonical;
        stats.rows += 1;
    }

    stats
}
