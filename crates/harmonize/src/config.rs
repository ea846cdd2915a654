//! JSON pipeline configuration.
//!
//! One file declares everything source specific: how to read the extract,
//! how its age buckets and categories map onto the canonical schema, and
//! which composite regions to build.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::apportion::{ApportionStep, CanonicalMapping};
use crate::cohort::{CanonicalCoverage, CoverageSource, ExplicitCoverage, LabelCoverage};
use crate::error::{HarmonizeError, Result};
use crate::geo::{ContainmentRules, Delineations, NestedRules, RemainderRules, TableRules};
use crate::input::SourceProfile;
use crate::schema::{CategorySet, Coverage};

/// Complete description of one harmonization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    /// Census edition. Selects the source variant and dates records of
    /// sources without a year column.
    #[serde(default)]
    pub year: Option<i32>,
    pub source: SourceConfig,
    /// Further tables joined onto the primary source before apportionment.
    #[serde(default)]
    pub supplements: Vec<SupplementConfig>,
    pub cohorts: CohortConfig,
    pub categories: CategoryConfig,
    #[serde(default)]
    pub geo: Option<GeoConfig>,
    #[serde(default)]
    pub geo_stage: GeoStage,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Fetched when `path` does not exist.
    #[serde(default)]
    pub download_url: Option<String>,
    pub profile: SourceProfile,
}

/// A second table of the same population, such as an identity table
/// released alongside the main one.
///
/// It has its own age buckets, so its own cohort assignment. Only the
/// categories listed in `categories` are kept, under their new names, and
/// they are added into the primary table row by row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplementConfig {
    #[serde(flatten)]
    pub source: SourceConfig,
    pub cohorts: CohortConfig,
    /// Source category -> category name in the merged table.
    pub categories: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortConfig {
    pub coverage: CoverageConfig,
    /// Sum cohort 0 from the age bands when no bucket covers it.
    #[serde(default)]
    pub derive_total: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoverageConfig {
    /// Bucket id -> free-text label.
    Labels { labels: IndexMap<String, String> },
    /// Bucket id -> canonical cohorts.
    Explicit { sets: IndexMap<String, Coverage> },
    /// Buckets are already canonical cohort numbers.
    Canonical,
}

impl CoverageConfig {
    pub fn source(&self) -> Box<dyn CoverageSource> {
        match self {
            CoverageConfig::Labels { labels } => Box::new(LabelCoverage::new(labels.clone())),
            CoverageConfig::Explicit { sets } => Box::new(ExplicitCoverage::new(sets.clone())),
            CoverageConfig::Canonical => Box::new(CanonicalCoverage),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default)]
    pub canonical: CategorySet,
    /// Expected source categories; the run fails if the source differs.
    #[serde(default)]
    pub declared: Option<Vec<String>>,
    #[serde(default)]
    pub steps: Vec<ApportionStep>,
    pub mapping: CanonicalMapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeoConfig {
    /// Nation, state and metropolitan areas of county identifiers.
    Nested {
        delineations: PathBuf,
        #[serde(default = "default_nation")]
        nation: String,
    },
    /// "Rest of province" remainders.
    Remainder {
        #[serde(default = "default_remainder_prefix")]
        prefix: String,
        #[serde(default)]
        excluded: Option<Vec<String>>,
    },
    /// Explicit contributions per leaf region.
    Table(TableRules),
}

fn default_nation() -> String {
    "0".to_string()
}

fn default_remainder_prefix() -> String {
    "R".to_string()
}

/// Where region aggregation runs relative to category apportionment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoStage {
    #[default]
    AfterApportionment,
    /// Composite regions get their own ratio coefficients.
    BeforeApportionment,
}

impl PipelineConfig {
    /// Load a configuration file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| HarmonizeError::io(path, e))?;
        let mut config: PipelineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        debug!(path = %path.display(), name = %config.name, "loaded pipeline configuration");
        Ok(config)
    }

    /// Parse a configuration from a JSON string; paths stay as written.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.resolve_path(&self.source.path)
    }

    pub fn supplement_paths(&self) -> Vec<PathBuf> {
        self.supplements
            .iter()
            .map(|s| self.resolve_path(&s.source.path))
            .collect()
    }

    /// Output directory, defaulting to `DATA` next to the configuration.
    pub fn output_path(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => self.resolve_path(dir),
            None => self.base_dir.join("DATA"),
        }
    }

    /// Build the containment rules, loading delineations if needed.
    pub fn containment_rules(&self) -> Result<Option<Box<dyn ContainmentRules>>> {
        let rules: Box<dyn ContainmentRules> = match &self.geo {
            None => return Ok(None),
            Some(GeoConfig::Nested {
                delineations,
                nation,
            }) => {
                let delineations = Delineations::from_path(&self.resolve_path(delineations))?;
                Box::new(NestedRules::new(delineations).with_nation(nation.as_str()))
            }
            Some(GeoConfig::Remainder { prefix, excluded }) => {
                let mut rules = RemainderRules::new().with_prefix(prefix.as_str());
                if let Some(excluded) = excluded {
                    rules = rules.with_excluded(excluded.clone());
                }
                Box::new(rules)
            }
            Some(GeoConfig::Table(table)) => Box::new(table.clone()),
        };
        Ok(Some(rules))
    }
}
