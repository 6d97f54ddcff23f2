//! Cookbook CLI - typeset YAML recipes into PDFs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

/// One or more recipes failed to build.
const EXIT_RECIPES_FAILED: u8 = 1;

/// The build could not start (bad configuration, missing source directory).
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "cookbook")]
#[command(about = "Typeset YAML recipes into PDFs with LaTeX")]
#[command(version)]
pub struct Cli {
    /// Directory containing recipe sources
    source: PathBuf,

    /// Destination directory for PDFs
    output: PathBuf,

    /// Number of recipes to compile in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Keep building the remaining recipes after one fails
    #[arg(long)]
    continue_on_error: bool,

    /// Kill the TeX engine after this many seconds (0 disables)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Remove the destination directory before building
    #[arg(long)]
    clean: bool,

    /// Path to cookbook.toml config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let args = commands::build::BuildArgs {
        source: cli.source,
        output: cli.output,
        jobs: cli.jobs,
        continue_on_error: cli.continue_on_error,
        timeout: cli.timeout,
        clean: cli.clean,
        config: cli.config,
        verbose: cli.verbose,
    };

    match commands::build::run(args).await {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_RECIPES_FAILED),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
