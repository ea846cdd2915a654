//! Cohorts command - show the cohort assignment of a configuration.

use std::path::PathBuf;

use colored::Colorize;
use harmonize::cohort::CohortAssignment;
use harmonize::schema::{cohort_label, OPEN_COHORT, TOTAL_COHORT};
use harmonize::{Harmonizer, PipelineConfig};

pub fn run(config_path: PathBuf, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::load(&config_path)?;
    let harmonizer = Harmonizer::with_config(config)?;
    println!(
        "{} {}",
        "Cohort assignment for".cyan().bold(),
        harmonizer.config().name.white()
    );
    print_assignment(harmonizer.assignment(), verbose);

    for (index, supplement) in harmonizer.config().supplements.iter().enumerate() {
        if let Some(assignment) = harmonizer.supplement_assignment(index) {
            println!();
            println!(
                "{} {}",
                "Supplement".cyan().bold(),
                supplement.source.path.display()
            );
            print_assignment(assignment, verbose);
        }
    }

    Ok(())
}

fn print_assignment(assignment: &CohortAssignment, verbose: bool) {
    println!();
    for cohort in TOTAL_COHORT..=OPEN_COHORT {
        let label = cohort_label(cohort);
        match assignment.bucket_for(cohort) {
            Some(bucket) => {
                let shared = assignment.cohorts_for(bucket).len();
                let share = if shared > 1 {
                    format!(" (1/{} share)", shared).yellow().to_string()
                } else {
                    String::new()
                };
                print!("  {:>3} {:8} <- {}{}", cohort, label, bucket.white(), share);
                if verbose {
                    if let Some(coverage) = assignment.coverage_of(bucket) {
                        let cohorts: Vec<String> = coverage.iter().map(|c| c.to_string()).collect();
                        print!("  covers [{}]", cohorts.join(","));
                    }
                }
                println!();
            }
            None => println!("  {:>3} {:8} <- {}", cohort, label, "derived".blue()),
        }
    }

    let unused: Vec<&str> = assignment.unused_buckets().collect();
    if !unused.is_empty() {
        println!();
        println!("{} {}", "Unused buckets:".yellow().bold(), unused.join(", "));
    }
}
