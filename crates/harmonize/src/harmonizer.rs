//! Main Harmonizer struct and public API.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::apportion::{check_declared_categories, ApportionStats, Apportioner};
use crate::cohort::{remap, CohortAssignment, CohortResolver};
use crate::config::{CohortConfig, GeoStage, PipelineConfig, SourceConfig};
use crate::error::{HarmonizeError, Result};
use crate::geo::{ContainmentRules, GeoAggregator, GeoStats};
use crate::input::{
    ensure_file, Parser, ParserConfig, RawRecord, ReadStats, SourceMetadata, SourceProfile,
};
use crate::rates::{MetricTable, RateCalculator, RateStats};
use crate::table::{ObservationTable, SanitizeReport};

/// Result of a harmonization run.
#[derive(Debug, Clone)]
pub struct HarmonizeResult {
    /// Metadata about the source file, when the run read one.
    pub source: Option<SourceMetadata>,
    /// Metadata about each supplementary table read.
    pub supplements: Vec<SourceMetadata>,
    /// The harmonized table, composite regions included.
    pub table: ObservationTable,
    pub metrics: MetricTable,
    pub summary: RunSummary,
}

/// What happened during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub records: usize,
    /// Read counts summed over every source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<ReadStats>,
    /// Records whose age bucket was not chosen for any cohort.
    pub unassigned_records: usize,
    /// Records that replaced an earlier record with the same key.
    pub overwritten_records: usize,
    /// Supplementary records in categories that are not kept.
    #[serde(default)]
    pub dropped_records: usize,
    pub apportion: ApportionStats,
    pub sanitize: SanitizeReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoStats>,
    pub rates: RateStats,
}

/// Records read from one source file.
pub type LoadedRecords = (Vec<RawRecord>, SourceMetadata, ReadStats);

/// A supplementary table ready to be read and remapped.
struct Supplement {
    parser: Parser,
    assignment: CohortAssignment,
}

/// The harmonization pipeline built from a [`PipelineConfig`].
///
/// Construction resolves the cohort assignments and validates the category
/// mapping, so a misconfigured pipeline fails before any data is read.
pub struct Harmonizer {
    config: PipelineConfig,
    parser: Parser,
    assignment: CohortAssignment,
    supplements: Vec<Supplement>,
    apportioner: Apportioner,
    rules: Option<Box<dyn ContainmentRules>>,
    rates: RateCalculator,
}

impl Harmonizer {
    /// Build a pipeline from configuration.
    pub fn with_config(config: PipelineConfig) -> Result<Self> {
        let assignment = resolve_cohorts(&config.cohorts)?;
        let parser = parser_for(&config.source.profile)?;

        let supplements = config
            .supplements
            .iter()
            .map(|s| {
                Ok(Supplement {
                    parser: parser_for(&s.source.profile)?,
                    assignment: resolve_cohorts(&s.cohorts)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let apportioner = Apportioner::new(
            config.categories.canonical.clone(),
            config.categories.steps.clone(),
            config.categories.mapping.clone(),
        )?;
        let rules = config.containment_rules()?;
        let rates = RateCalculator::new(config.categories.canonical.clone());

        Ok(Self {
            config,
            parser,
            assignment,
            supplements,
            apportioner,
            rules,
            rates,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Canonical cohort -> source bucket assignment of the primary source.
    pub fn assignment(&self) -> &CohortAssignment {
        &self.assignment
    }

    /// Cohort assignment of the supplementary table at `index`.
    pub fn supplement_assignment(&self, index: usize) -> Option<&CohortAssignment> {
        self.supplements.get(index).map(|s| &s.assignment)
    }

    /// Read the primary source into raw records, downloading it first
    /// if a URL is configured and the file is missing.
    pub fn load_records(&self) -> Result<LoadedRecords> {
        self.read_source(&self.config.source, &self.parser)
    }

    /// Read every supplementary table, in configuration order.
    pub fn load_supplements(&self) -> Result<Vec<LoadedRecords>> {
        self.config
            .supplements
            .iter()
            .zip(&self.supplements)
            .map(|(config, supplement)| self.read_source(&config.source, &supplement.parser))
            .collect()
    }

    fn read_source(&self, source: &SourceConfig, parser: &Parser) -> Result<LoadedRecords> {
        let path = self.config.resolve_path(&source.path);
        if let Some(url) = &source.download_url {
            ensure_file(&path, url)?;
        }

        let (table, mut metadata) = parser.parse_file(&path)?;
        let (records, stats) = source.profile.reader(self.config.year).read(&table)?;
        metadata.record_count = records.len();
        Ok((records, metadata, stats))
    }

    /// Read the configured sources and harmonize them.
    pub fn run_source(&self) -> Result<HarmonizeResult> {
        let (records, metadata, mut read) = self.load_records()?;

        let mut supplement_records = Vec::with_capacity(self.supplements.len());
        let mut supplement_metadata = Vec::with_capacity(self.supplements.len());
        for (records, metadata, stats) in self.load_supplements()? {
            read.absorb(stats);
            supplement_records.push(records);
            supplement_metadata.push(metadata);
        }

        let mut result = self.run_merged(records, supplement_records)?;
        result.source = Some(metadata);
        result.supplements = supplement_metadata;
        result.summary.read = Some(read);
        Ok(result)
    }

    /// Harmonize a record set of the primary source and compute its metrics.
    pub fn run(&self, records: Vec<RawRecord>) -> Result<HarmonizeResult> {
        self.run_merged(records, Vec::new())
    }

    /// Harmonize the primary records joined with supplementary record sets,
    /// given in the order the supplements are configured.
    pub fn run_merged(
        &self,
        records: Vec<RawRecord>,
        supplements: Vec<Vec<RawRecord>>,
    ) -> Result<HarmonizeResult> {
        let _span = info_span!("harmonize", pipeline = %self.config.name).entered();

        let (mut table, mut summary) = self.remap_sources(records, supplements)?;

        if let Some(declared) = &self.config.categories.declared {
            check_declared_categories(&table, declared)?;
        }

        let geo = self.rules.as_deref().map(GeoAggregator::new);

        if self.config.geo_stage == GeoStage::BeforeApportionment {
            summary.geo = geo.as_ref().map(|g| g.apply(&mut table));
        }

        summary.apportion = self.apportioner.apply(&mut table);

        if self.config.geo_stage == GeoStage::AfterApportionment {
            summary.geo = geo.as_ref().map(|g| g.apply(&mut table));
        }

        summary.sanitize = table.sanitize();

        if summary.apportion.indeterminate > 0 {
            warn!(
                count = summary.apportion.indeterminate,
                fallback_rows = summary.apportion.fallback_rows,
                "indeterminate apportionment ratios replaced"
            );
        }
        if summary.sanitize.non_finite + summary.sanitize.negative > 0 {
            warn!(
                non_finite = summary.sanitize.non_finite,
                negative = summary.sanitize.negative,
                "counts reset to zero after harmonization"
            );
        }

        let (metrics, rate_stats) = self.rates.compute(&table, |region| {
            geo.as_ref().is_some_and(|g| g.is_fragment(region))
        });
        summary.rates = rate_stats;

        if rate_stats.incomplete > 0 {
            warn!(
                count = rate_stats.incomplete,
                "region/years skipped for incomplete cohort coverage"
            );
        }
        info!(
            rows = table.len(),
            regions = metrics.len(),
            "harmonization complete"
        );

        Ok(HarmonizeResult {
            source: None,
            supplements: Vec::new(),
            table,
            metrics,
            summary,
        })
    }

    /// Move the primary and supplementary records onto canonical cohorts,
    /// each with its own assignment, and add them into one table.
    ///
    /// Supplementary records outside their category selection are dropped.
    pub fn remap_sources(
        &self,
        records: Vec<RawRecord>,
        supplements: Vec<Vec<RawRecord>>,
    ) -> Result<(ObservationTable, RunSummary)> {
        if records.is_empty() {
            return Err(HarmonizeError::EmptyData(
                "source produced no records".to_string(),
            ));
        }
        if supplements.len() > self.supplements.len() {
            return Err(HarmonizeError::Config(format!(
                "{} supplementary record sets given but {} configured",
                supplements.len(),
                self.supplements.len()
            )));
        }

        let mut summary = RunSummary {
            records: records.len(),
            ..RunSummary::default()
        };

        let outcome = remap(records, &self.assignment);
        summary.unassigned_records = outcome.unassigned;
        summary.overwritten_records = outcome.overwritten;
        let mut table = outcome.table;

        let configured = self.config.supplements.iter().zip(&self.supplements);
        for (records, (config, supplement)) in supplements.into_iter().zip(configured) {
            summary.records += records.len();

            let total = records.len();
            let kept: Vec<RawRecord> = records
                .into_iter()
                .filter_map(|mut record| {
                    let renamed = config.categories.get(&record.category)?;
                    record.category = renamed.clone();
                    Some(record)
                })
                .collect();
            summary.dropped_records += total - kept.len();

            let outcome = remap(kept, &supplement.assignment);
            summary.unassigned_records += outcome.unassigned;
            summary.overwritten_records += outcome.overwritten;
            debug!(
                path = %config.source.path.display(),
                rows = outcome.table.len(),
                "merged supplementary table"
            );
            table.merge(outcome.table);
        }

        Ok((table, summary))
    }
}

fn resolve_cohorts(cohorts: &CohortConfig) -> Result<CohortAssignment> {
    CohortResolver::new()
        .with_derived_total(cohorts.derive_total)
        .resolve(cohorts.coverage.source().as_ref())
}

fn parser_for(profile: &SourceProfile) -> Result<Parser> {
    let delimiter = match profile.delimiter {
        Some(d) if !d.is_ascii() => {
            return Err(HarmonizeError::Config(format!(
                "delimiter '{}' is not a single-byte ASCII character",
                d
            )));
        }
        Some(d) => Some(d as u8),
        None => None,
    };
    Ok(Parser::with_config(ParserConfig {
        delimiter,
        ..ParserConfig::default()
    }))
}
