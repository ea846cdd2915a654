//! Error types for the harmonization pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harmonization runs.
///
/// Every variant aborts the run it occurs in. Indeterminate arithmetic and
/// incomplete cohort coverage are not errors; they are recovered where they
/// occur and only show up in the run summary.
#[derive(Debug, Error)]
pub enum HarmonizeError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value in the source data could not be interpreted.
    #[error("Parse error at row {row}, column '{column}': {message}")]
    Parse {
        row: usize,
        column: String,
        message: String,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error downloading a source archive.
    #[error("HTTP error for '{url}': {message}")]
    Http { url: String, message: String },

    /// Empty file or no records to harmonize.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source's category set differs from the declared category list.
    #[error(
        "Category schema mismatch: missing from data [{}], not declared [{}]",
        missing.join(", "),
        unexpected.join(", ")
    )]
    SchemaMismatch {
        /// Declared categories absent from the data.
        missing: Vec<String>,
        /// Categories in the data that were never declared.
        unexpected: Vec<String>,
    },

    /// No source bucket covers a canonical cohort.
    #[error("No source age bucket covers canonical cohort {cohort}")]
    MappingGap { cohort: u8 },
}

impl HarmonizeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarmonizeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for harmonization operations.
pub type Result<T> = std::result::Result<T, HarmonizeError>;
