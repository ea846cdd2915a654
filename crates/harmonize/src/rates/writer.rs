//! Tab-separated metric output, one file per year.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{HarmonizeError, Result};

use super::metrics::MetricTable;

/// Writes a [`MetricTable`] as `<dir>/<year>.tsv` files.
#[derive(Debug, Clone)]
pub struct MetricsWriter {
    dir: PathBuf,
    region_header: String,
    /// File stem for rows without a year.
    undated_stem: String,
}

impl MetricsWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            region_header: "GEO".to_string(),
            undated_stem: "metrics".to_string(),
        }
    }

    pub fn with_undated_stem(mut self, stem: impl Into<String>) -> Self {
        self.undated_stem = stem.into();
        self
    }

    /// Write every year group and return the paths written, in year order.
    pub fn write(&self, metrics: &MetricTable) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir).map_err(|e| HarmonizeError::io(&self.dir, e))?;

        let mut header = vec![self.region_header.clone()];
        header.extend(metrics.column_names());

        let mut written = Vec::new();
        for (year, rows) in metrics.by_year() {
            let stem = match year {
                Some(y) => y.to_string(),
                None => self.undated_stem.clone(),
            };
            let path = self.dir.join(format!("{}.tsv", stem));

            let mut writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .from_path(&path)?;
            writer.write_record(&header)?;
            for row in &rows {
                let mut record = vec![row.region.clone()];
                record.extend(row.cells(metrics.categories()));
                writer.write_record(&record)?;
            }
            writer.flush().map_err(|e| HarmonizeError::io(&path, e))?;

            info!(path = %path.display(), regions = rows.len(), "wrote metrics");
            written.push(path);
        }

        Ok(written)
    }
}

/// Write `metrics` under `dir` with the default layout.
pub fn write_metrics(dir: &Path, metrics: &MetricTable) -> Result<Vec<PathBuf>> {
    MetricsWriter::new(dir).write(metrics)
}
