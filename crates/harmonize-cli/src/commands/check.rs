//! Check command - validate a configuration against its source.

use std::path::PathBuf;

use colored::Colorize;
use harmonize::apportion::check_declared_categories;
use harmonize::input::ReadStats;
use harmonize::{Harmonizer, PipelineConfig, SourceMetadata};

pub fn run(config_path: PathBuf, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !config_path.exists() {
        return Err(format!("Configuration not found: {}", config_path.display()).into());
    }

    let config = PipelineConfig::load(&config_path)?;
    println!(
        "{} {}",
        "Checking".cyan().bold(),
        config.name.white()
    );

    // Cohort coverage, category mapping and geo rules are validated here.
    let harmonizer = Harmonizer::with_config(config)?;
    println!("  {} configuration", "✓".green());

    let unused: Vec<&str> = harmonizer.assignment().unused_buckets().collect();
    if !unused.is_empty() {
        println!(
            "  {} {} age buckets never used: {}",
            "!".yellow(),
            unused.len(),
            unused.join(", ")
        );
    }

    let (records, source, read) = harmonizer.load_records()?;
    print_source(&source, &read, records.len(), verbose);

    let mut supplements = Vec::new();
    for (index, (records, source, read)) in harmonizer.load_supplements()?.into_iter().enumerate() {
        print_source(&source, &read, records.len(), verbose);
        if let Some(assignment) = harmonizer.supplement_assignment(index) {
            let unused: Vec<&str> = assignment.unused_buckets().collect();
            if !unused.is_empty() {
                println!(
                    "  {} {} age buckets never used: {}",
                    "!".yellow(),
                    unused.len(),
                    unused.join(", ")
                );
            }
        }
        supplements.push(records);
    }

    let (table, summary) = harmonizer.remap_sources(records, supplements)?;
    let categories = table.categories();
    println!(
        "  {} {} regions, {} source categories",
        "✓".green(),
        table.regions().len(),
        categories.len()
    );
    if summary.dropped_records > 0 && verbose {
        println!(
            "    supplementary records outside the kept categories: {}",
            summary.dropped_records
        );
    }

    match &harmonizer.config().categories.declared {
        Some(declared) => {
            check_declared_categories(&table, declared)?;
            println!("  {} source categories match declared list", "✓".green());
        }
        None if verbose => {
            for category in &categories {
                println!("    {}", category);
            }
        }
        None => {}
    }

    println!("{}", "Configuration OK".green().bold());
    Ok(())
}

fn print_source(source: &SourceMetadata, read: &ReadStats, records: usize, verbose: bool) {
    println!(
        "  {} source {} ({} rows, {} records)",
        "✓".green(),
        source.file.white(),
        source.row_count,
        records
    );
    if verbose {
        println!("    format: {}  hash: {}", source.format, source.hash);
        println!(
            "    filtered: {}  unmapped sex: {}  years dropped: {}  missing: {}",
            read.filtered, read.unmapped_sex, read.out_of_range_year, read.missing_values
        );
    }
}
