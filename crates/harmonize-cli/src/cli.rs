//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Harmonize: census cohort harmonization and fertility metrics
#[derive(Parser)]
#[command(name = "harmonize")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harmonize a source and write CRR/ACE tables, one TSV per year
    Run {
        /// Path to the pipeline configuration (JSON)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Output directory (default: the configured one, or DATA/ next to the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a configuration against its source without writing output
    Check {
        /// Path to the pipeline configuration (JSON)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Show which source age bucket each canonical cohort is taken from
    Cohorts {
        /// Path to the pipeline configuration (JSON)
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}
