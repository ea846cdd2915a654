//! Harmonize CLI - census cohort harmonization.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            output,
            json,
        } => commands::run::run(config, output, json, cli.verbose),

        Commands::Check { config } => commands::check::run(config, cli.verbose),

        Commands::Cohorts { config } => commands::cohorts::run(config, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` on top of a default level.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(level.into()));

    tracing_subscriber::registry().with(stderr_layer).init();
}
