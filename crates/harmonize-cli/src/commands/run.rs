//! Run command - harmonize a source and write metric tables.

use std::path::PathBuf;

use colored::Colorize;
use harmonize::rates::MetricsWriter;
use harmonize::{Harmonizer, PipelineConfig, RunSummary};

pub fn run(
    config_path: PathBuf,
    output: Option<PathBuf>,
    json_output: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !config_path.exists() {
        return Err(format!("Configuration not found: {}", config_path.display()).into());
    }

    let config = PipelineConfig::load(&config_path)?;
    let output_dir = output.unwrap_or_else(|| config.output_path());
    let undated_stem = config.name.clone();

    if !json_output {
        println!(
            "{} {} ({})",
            "Harmonizing".cyan().bold(),
            config.name.white(),
            config.source_path().display()
        );
    }

    let harmonizer = Harmonizer::with_config(config)?;
    let result = harmonizer.run_source()?;

    // Only a completed run reaches the writer.
    let written = MetricsWriter::new(&output_dir)
        .with_undated_stem(undated_stem)
        .write(&result.metrics)?;

    if json_output {
        let report = serde_json::json!({
            "pipeline": harmonizer.config().name,
            "source": result.source,
            "supplements": result.supplements,
            "summary": result.summary,
            "written": written,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_summary(&result.summary, verbose);

    println!();
    for path in &written {
        println!("  {} {}", "Wrote".green(), path.display());
    }
    println!(
        "{} {} region/years rated",
        "Done:".green().bold(),
        result.metrics.len().to_string().white().bold()
    );

    Ok(())
}

fn print_summary(summary: &RunSummary, verbose: bool) {
    println!();
    println!("{}", "Summary:".yellow().bold());
    println!("  Records:          {}", summary.records.to_string().white());
    if let Some(read) = &summary.read {
        if verbose {
            println!("  Source rows:      {}", read.rows);
            println!("  Filtered rows:    {}", read.filtered);
            println!("  Unmapped sex:     {}", read.unmapped_sex);
            println!("  Years dropped:    {}", read.out_of_range_year);
        }
        if read.missing_values > 0 {
            println!("  Missing values:   {}", read.missing_values.to_string().yellow());
        }
    }
    if summary.unassigned_records > 0 {
        println!(
            "  Unassigned:       {}",
            summary.unassigned_records.to_string().yellow()
        );
    }
    if verbose && summary.dropped_records > 0 {
        println!("  Dropped (suppl.): {}", summary.dropped_records);
    }
    if summary.overwritten_records > 0 {
        println!(
            "  Duplicates:       {}",
            summary.overwritten_records.to_string().yellow()
        );
    }
    if let Some(geo) = &summary.geo {
        println!("  Composites:       {}", geo.composite_regions.to_string().white());
        if geo.collisions > 0 {
            println!("  Id collisions:    {}", geo.collisions.to_string().red());
        }
    }
    println!(
        "  Indeterminate:    {}",
        colour_count(summary.apportion.indeterminate)
    );
    if summary.apportion.fallback_rows > 0 {
        println!(
            "  Even-split rows:  {}",
            summary.apportion.fallback_rows.to_string().yellow()
        );
    }
    println!(
        "  Reset to zero:    {}",
        colour_count(summary.sanitize.non_finite + summary.sanitize.negative)
    );
    println!(
        "  Incomplete:       {}",
        colour_count(summary.rates.incomplete)
    );
}

fn colour_count(count: usize) -> colored::ColoredString {
    if count == 0 {
        count.to_string().green()
    } else {
        count.to_string().yellow()
    }
}
