//! Metropolitan delineation table: county -> CBSA and CSA.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{HarmonizeError, Result};

/// Statistical areas a county belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delineation {
    pub cbsa: String,
    pub csa: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DelineationRecord {
    #[serde(rename = "FIPS")]
    fips: String,
    #[serde(rename = "CBSACode", default)]
    cbsa: String,
    #[serde(rename = "CSACode", default)]
    csa: String,
}

/// Delineations keyed by five-digit county FIPS code.
#[derive(Debug, Clone, Default)]
pub struct Delineations {
    by_fips: HashMap<String, Delineation>,
}

impl Delineations {
    /// Load a `FIPS,CBSACode,CSACode,...` file. Extra columns are ignored.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| HarmonizeError::io(path, e))?;
        let delineations = Self::from_reader(file)?;
        debug!(
            path = %path.display(),
            counties = delineations.len(),
            "loaded delineations"
        );
        Ok(delineations)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let mut by_fips = HashMap::new();

        for record in csv_reader.deserialize::<DelineationRecord>() {
            let record = record?;
            let cbsa = normalize_code(&record.cbsa);
            // Counties outside any CBSA have no composite beyond their state.
            let Some(cbsa) = cbsa else { continue };
            let fips = format!("{:0>5}", record.fips.trim());
            by_fips.insert(
                fips,
                Delineation {
                    cbsa,
                    csa: normalize_code(&record.csa),
                },
            );
        }

        Ok(Self { by_fips })
    }

    pub fn insert(&mut self, fips: impl Into<String>, delineation: Delineation) {
        self.by_fips.insert(fips.into(), delineation);
    }

    pub fn get(&self, fips: &str) -> Option<&Delineation> {
        self.by_fips.get(fips)
    }

    pub fn len(&self) -> usize {
        self.by_fips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fips.is_empty()
    }
}

/// Blank -> None; spreadsheet floats such as `348.0` -> `348`.
fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.fract() == 0.0 && n >= 0.0 => Some(format!("{}", n as u64)),
        _ => Some(trimmed.to_string()),
    }
}
