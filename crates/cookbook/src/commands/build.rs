//! Cookbook build command.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cookbook_latex::{BuildConfig, BuildSummary, Compiler, CookbookBuilder, RecipeFailure};
use serde::Deserialize;

/// Config file used when `--config` is not given.
const DEFAULT_CONFIG: &str = "cookbook.toml";

/// Compiler log lines shown per failed recipe without `--verbose`.
const LOG_EXCERPT_LINES: usize = 20;

/// Command-line arguments for a build.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    pub source: PathBuf,
    pub output: PathBuf,
    pub jobs: Option<usize>,
    pub continue_on_error: bool,
    pub timeout: Option<u64>,
    pub clean: bool,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Configuration file structure (cookbook.toml).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    build: BuildSettings,
    #[serde(default)]
    compiler: CompilerSettings,
}

#[derive(Debug, Deserialize)]
struct BuildSettings {
    #[serde(default = "default_jobs")]
    jobs: usize,
    #[serde(default)]
    continue_on_error: bool,
    /// Seconds; 0 disables the timeout
    #[serde(default = "default_timeout")]
    timeout: u64,
    #[serde(default)]
    clean: bool,
    #[serde(default = "default_true")]
    typography: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            continue_on_error: false,
            timeout: default_timeout(),
            clean: false,
            typography: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompilerSettings {
    #[serde(default = "default_program")]
    program: String,
    #[serde(default = "default_args")]
    args: Vec<String>,
    #[serde(default = "default_extension")]
    extension: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            extension: default_extension(),
        }
    }
}

fn default_jobs() -> usize {
    1
}
fn default_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}
fn default_program() -> String {
    "pdflatex".to_string()
}
fn default_args() -> Vec<String> {
    vec![
        "-interaction=nonstopmode".to_string(),
        "-halt-on-error".to_string(),
    ]
}
fn default_extension() -> String {
    "pdf".to_string()
}

/// Load configuration.
///
/// An explicitly given file must exist; the default `cookbook.toml` is optional.
fn load_config(path: Option<&Path>) -> Result<ConfigFile> {
    let (config_path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };

    if !config_path.exists() {
        if required {
            anyhow::bail!("Config file not found: {}", config_path.display());
        }
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;
    tracing::info!("Loaded config from {}", config_path.display());

    Ok(config)
}

/// Merge command-line flags over the config file.
fn build_config(args: BuildArgs, file: ConfigFile) -> BuildConfig {
    let timeout = args.timeout.unwrap_or(file.build.timeout);
    let timeout = (timeout > 0).then(|| Duration::from_secs(timeout));

    let compiler = Compiler::new(file.compiler.program, file.compiler.args)
        .with_extension(file.compiler.extension)
        .with_timeout(timeout);

    BuildConfig {
        source_dir: args.source,
        output_dir: args.output,
        jobs: args.jobs.unwrap_or(file.build.jobs).max(1),
        continue_on_error: args.continue_on_error || file.build.continue_on_error,
        clean: args.clean || file.build.clean,
        typography: file.build.typography,
        compiler,
    }
}

/// Run the build command.
pub async fn run(args: BuildArgs) -> Result<BuildSummary> {
    let file_config = load_config(args.config.as_deref())?;
    let verbose = args.verbose;

    let config = build_config(args, file_config);
    tracing::info!(
        "Building {} -> {}",
        config.source_dir.display(),
        config.output_dir.display()
    );

    let summary = CookbookBuilder::new(config).build().await?;

    report(&summary, verbose);

    Ok(summary)
}

/// Print failures and the final tally.
fn report(summary: &BuildSummary, verbose: bool) {
    for failure in &summary.failed {
        tracing::error!("{}", failure_line(failure));

        if let Some(log) = failure.error.log() {
            for line in log_excerpt(log, verbose) {
                tracing::warn!("    {}", line);
            }
        }
    }

    if !summary.skipped.is_empty() {
        tracing::warn!(
            "Skipped {} recipes after the first failure (use --continue-on-error to build them)",
            summary.skipped.len()
        );
    }

    tracing::info!("{}", summary_line(summary));
    tracing::info!("Output: {}", summary.output_dir.display());
}

/// `<identifier>: <kind> error: <first line of the cause>`
fn failure_line(failure: &RecipeFailure) -> String {
    let message = failure.error.to_string();
    let cause = message.lines().next().unwrap_or_default();
    format!(
        "{}: {} error: {}",
        failure.identifier,
        failure.error.kind(),
        cause
    )
}

fn summary_line(summary: &BuildSummary) -> String {
    format!(
        "{} built, {} failed, {} skipped in {}ms",
        summary.built.len(),
        summary.failed.len(),
        summary.skipped.len(),
        summary.duration_ms
    )
}

/// The part of a compiler log worth showing.
///
/// TeX marks errors with a leading `!`, so the excerpt starts at the first
/// such line when there is one, otherwise it is the tail of the log.
fn log_excerpt(log: &str, verbose: bool) -> Vec<&str> {
    let lines: Vec<&str> = log.lines().collect();
    if verbose {
        return lines;
    }

    let start = lines
        .iter()
        .position(|l| l.starts_with('!'))
        .unwrap_or_else(|| lines.len().saturating_sub(LOG_EXCERPT_LINES));

    lines[start..].iter().take(LOG_EXCERPT_LINES).copied().collect()
}
