//! Harmonize: census cohort harmonization.
//!
//! Census extracts disagree on how they bucket ages, how they classify
//! ethnicity and race, and how their regions nest. Harmonize maps a source
//! onto one canonical schema (19 age cohorts and a configured set of
//! disjoint categories), builds composite regions by signed accumulation,
//! and derives two fertility metrics per region: the crude reproduction
//! rate (CRR) and the annual cohort exchange (ACE).
//!
//! # Pipeline
//!
//! - **Cohorts**: each source bucket's coverage is inferred from its label
//!   and every canonical cohort takes the narrowest covering bucket.
//! - **Categories**: ambiguous, combined and unspecified responses are
//!   apportioned into the canonical categories.
//! - **Regions**: leaf regions feed composite regions with `+1`/`-1` signs.
//! - **Rates**: CRR and ACE from the female cohort counts.
//!
//! # Example
//!
//! ```no_run
//! use harmonize::{Harmonizer, PipelineConfig};
//!
//! let config = PipelineConfig::load("configs/nz-dtr4.json").unwrap();
//! let harmonizer = Harmonizer::with_config(config).unwrap();
//! let result = harmonizer.run_source().unwrap();
//!
//! println!("Regions rated: {}", result.metrics.len());
//! ```

pub mod apportion;
pub mod cohort;
pub mod config;
pub mod error;
pub mod geo;
pub mod input;
pub mod numeric;
pub mod rates;
pub mod schema;
pub mod table;

mod harmonizer;

pub use crate::harmonizer::{HarmonizeResult, Harmonizer, RunSummary};
pub use config::{GeoStage, PipelineConfig, SupplementConfig};
pub use error::{HarmonizeError, Result};
pub use input::{RawRecord, SourceMetadata};
pub use rates::{MetricPair, MetricTable};
pub use schema::{CategorySet, Sex};
pub use table::{ObservationTable, RowKey};
