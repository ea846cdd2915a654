//! The canonical category set.

use serde::{Deserialize, Serialize};

use crate::error::{HarmonizeError, Result};

/// Ordered canonical categories with one designated total.
///
/// The total (conventionally `E`, "everyone") holds the whole population;
/// every other code is a disjoint bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySet {
    /// Category codes in output order.
    pub codes: Vec<String>,
    /// The code holding the whole population.
    pub total: String,
}

impl CategorySet {
    pub fn new(codes: impl IntoIterator<Item = impl Into<String>>, total: impl Into<String>) -> Self {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            total: total.into(),
        }
    }

    /// Check that the set is non-empty, unique, and contains its total.
    pub fn validate(&self) -> Result<()> {
        if self.codes.is_empty() {
            return Err(HarmonizeError::Config(
                "canonical category set is empty".to_string(),
            ));
        }
        for (i, code) in self.codes.iter().enumerate() {
            if self.codes[..i].contains(code) {
                return Err(HarmonizeError::Config(format!(
                    "canonical category '{}' is listed twice",
                    code
                )));
            }
        }
        if !self.contains(&self.total) {
            return Err(HarmonizeError::Config(format!(
                "total category '{}' is not in the canonical set",
                self.total
            )));
        }
        Ok(())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    /// Codes other than the total.
    pub fn disjoint(&self) -> impl Iterator<Item = &str> {
        self.codes
            .iter()
            .map(String::as_str)
            .filter(move |c| *c != self.total)
    }

    pub fn disjoint_count(&self) -> usize {
        self.disjoint().count()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(["E", "W", "B", "R", "Y", "N"], "E")
    }
}
