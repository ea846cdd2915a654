//! Source metadata and the raw record set handed to the pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::Sex;

/// Metadata about a loaded source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected format (csv, tsv, etc.).
    pub format: String,
    /// Number of data rows read (excluding header).
    pub row_count: usize,
    /// Number of raw records produced from those rows.
    pub record_count: usize,
    /// When the file was loaded.
    pub loaded_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Create metadata for a file that has been read.
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        format: String,
        row_count: usize,
        record_count: usize,
    ) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash,
            size_bytes,
            format,
            row_count,
            record_count,
            loaded_at: Utc::now(),
        }
    }
}

/// One raw observation in a source's own vocabulary.
///
/// `bucket` and `category` are source codes; the cohort and category stages
/// translate them into canonical ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub year: Option<i32>,
    /// Source age bucket identifier.
    pub bucket: String,
    pub sex: Sex,
    /// Source category code.
    pub category: String,
    pub value: f64,
}

impl RawRecord {
    pub fn new(
        region: impl Into<String>,
        year: Option<i32>,
        bucket: impl Into<String>,
        sex: Sex,
        category: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            region: region.into(),
            year,
            bucket: bucket.into(),
            sex,
            category: category.into(),
            value,
        }
    }
}

/// Represents parsed delimited text.
#[derive(Debug, Clone)]
pub struct DataTable {
    /// Column headers.
    pub headers: Vec<String>,
    /// Row data as strings (row-major order).
    pub rows: Vec<Vec<String>>,
    /// The delimiter used.
    pub delimiter: u8,
}

impl DataTable {
    /// Create a new data table.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>, delimiter: u8) -> Self {
        Self {
            headers,
            rows,
            delimiter,
        }
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Get a cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(|s| s.as_str())
    }

    /// Check if a value represents a missing count.
    ///
    /// Census tables mark suppressed or unavailable cells with symbols
    /// rather than leaving them empty.
    pub fn is_null_value(value: &str) -> bool {
        let trimmed = value.trim();
        matches!(
            trimmed.to_lowercase().as_str(),
            "" | "na" | "n/a" | "null" | "." | ".." | "..." | "x" | "f" | "-"
        )
    }
}
