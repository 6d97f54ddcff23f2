//! Cookbook builder.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use cookbook_recipe::{discover, LoadError, RecipeFile};

use crate::compiler::{CompileError, Compiler};
use crate::templates::RecipeTemplate;

/// Name of the generated document inside each scratch directory.
const DOCUMENT_NAME: &str = "recipe.tex";

/// Configuration for building a cookbook.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory containing recipe sources
    pub source_dir: PathBuf,

    /// Directory receiving compiled artifacts
    pub output_dir: PathBuf,

    /// Number of recipes compiled concurrently
    pub jobs: usize,

    /// Keep going after a recipe fails
    pub continue_on_error: bool,

    /// Remove the output directory before building
    pub clean: bool,

    /// Rewrite fraction and degree shorthands
    pub typography: bool,

    /// External document compiler
    pub compiler: Compiler,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("recipes"),
            output_dir: PathBuf::from("pdfs"),
            jobs: 1,
            continue_on_error: false,
            clean: false,
            typography: true,
            compiler: Compiler::default(),
        }
    }
}

/// A recipe that was compiled successfully.
#[derive(Debug, Clone)]
pub struct BuiltRecipe {
    /// Recipe identifier (relative path without extension)
    pub identifier: String,

    /// Where the artifact was placed
    pub output_path: PathBuf,

    /// Time spent on this recipe in milliseconds
    pub duration_ms: u64,
}

/// A recipe that could not be built.
#[derive(Debug)]
pub struct RecipeFailure {
    /// Recipe identifier (relative path without extension)
    pub identifier: String,

    /// Source file
    pub source_path: PathBuf,

    /// What went wrong
    pub error: RecipeError,
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildSummary {
    /// Recipes compiled, in discovery order
    pub built: Vec<BuiltRecipe>,

    /// Recipes that failed, in discovery order
    pub failed: Vec<RecipeFailure>,

    /// Recipes never attempted because an earlier one failed
    pub skipped: Vec<String>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildSummary {
    /// Whether every discovered recipe was built.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Errors that fail a single recipe.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Failed to render template: {0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("{} and {} both produce {}", .first.display(), .second.display(), .output.display())]
    DuplicateOutput {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}

impl RecipeError {
    /// Short label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RecipeError::Load(e) => e.kind(),
            RecipeError::Template(_) => "template",
            RecipeError::Compile(_) => "compile",
            RecipeError::Write { .. } => "write",
            RecipeError::DuplicateOutput { .. } => "duplicate",
        }
    }

    /// Captured compiler output, for compile errors.
    pub fn log(&self) -> Option<&str> {
        match self {
            RecipeError::Compile(e) => e.log(),
            _ => None,
        }
    }
}

/// Errors that abort the whole build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Failed to scan sources: {0}")]
    Discover(LoadError),

    #[error("Refusing to clean {0}: it contains the source directory")]
    UnsafeClean(PathBuf),

    #[error("Failed to prepare output directory: {0}")]
    WriteError(String),

    #[error("Failed to start workers: {0}")]
    Workers(String),
}

enum Outcome {
    Built(BuiltRecipe),
    Failed(RecipeFailure),
    Skipped(String),
}

/// Builds a PDF for every recipe in a source tree.
#[derive(Clone)]
pub struct CookbookBuilder {
    config: BuildConfig,
    template: RecipeTemplate,
}

impl CookbookBuilder {
    /// Create a new cookbook builder.
    pub fn new(config: BuildConfig) -> Self {
        let template = RecipeTemplate::with_typography(config.typography);
        Self { config, template }
    }

    /// Build the cookbook on tokio's blocking pool.
    pub async fn build(&self) -> Result<BuildSummary, BuildError> {
        let builder = self.clone();

        tokio::task::spawn_blocking(move || builder.build_blocking())
            .await
            .map_err(|e| BuildError::Workers(e.to_string()))?
    }

    /// Build the cookbook on the current thread and the worker pool.
    pub fn build_blocking(&self) -> Result<BuildSummary, BuildError> {
        let start = Instant::now();

        if !self.config.source_dir.is_dir() {
            return Err(BuildError::SourceNotFound(self.config.source_dir.clone()));
        }

        self.prepare_output()?;

        let recipes = discover(&self.config.source_dir).map_err(BuildError::Discover)?;
        tracing::info!(
            "Found {} recipes in {}",
            recipes.len(),
            self.config.source_dir.display()
        );

        let claimed_by = self.earlier_claims(&recipes);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs.max(1))
            .build()
            .map_err(|e| BuildError::Workers(e.to_string()))?;

        let aborted = AtomicBool::new(false);

        let outcomes: Vec<Outcome> = pool.install(|| {
            recipes
                .par_iter()
                .zip(claimed_by.par_iter())
                .map(|(file, claimed_by)| {
                    if aborted.load(Ordering::SeqCst) {
                        return Outcome::Skipped(file.identifier.clone());
                    }

                    let result = match claimed_by {
                        Some(first) => Err(RecipeError::DuplicateOutput {
                            output: self.output_path(file),
                            first: first.clone(),
                            second: file.path.clone(),
                        }),
                        None => self.build_recipe(file),
                    };

                    match result {
                        Ok(built) => Outcome::Built(built),
                        Err(error) => {
                            tracing::debug!("Recipe {} failed: {}", file.identifier, error);
                            if !self.config.continue_on_error {
                                aborted.store(true, Ordering::SeqCst);
                            }
                            Outcome::Failed(RecipeFailure {
                                identifier: file.identifier.clone(),
                                source_path: file.path.clone(),
                                error,
                            })
                        }
                    }
                })
                .collect()
        });

        let mut summary = BuildSummary {
            built: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            duration_ms: 0,
            output_dir: self.config.output_dir.clone(),
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Built(built) => summary.built.push(built),
                Outcome::Failed(failure) => summary.failed.push(failure),
                Outcome::Skipped(identifier) => summary.skipped.push(identifier),
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Create the output directory, clearing it first when configured.
    fn prepare_output(&self) -> Result<(), BuildError> {
        let output = &self.config.output_dir;

        if self.config.clean && output.exists() {
            let output_abs =
                fs::canonicalize(output).map_err(|e| BuildError::WriteError(e.to_string()))?;
            let source_abs = fs::canonicalize(&self.config.source_dir)
                .map_err(|e| BuildError::WriteError(e.to_string()))?;

            if source_abs.starts_with(&output_abs) {
                return Err(BuildError::UnsafeClean(output.clone()));
            }

            tracing::info!("Cleaning {}", output.display());
            fs::remove_dir_all(output).map_err(|e| BuildError::WriteError(e.to_string()))?;
        }

        fs::create_dir_all(output).map_err(|e| BuildError::WriteError(e.to_string()))
    }

    /// Load, render and compile one recipe.
    ///
    /// Each recipe gets its own scratch directory, removed when this returns.
    fn build_recipe(&self, file: &RecipeFile) -> Result<BuiltRecipe, RecipeError> {
        let start = Instant::now();

        let recipe = file.load()?;
        let document = self.template.render(&recipe)?;

        let workdir = tempfile::Builder::new()
            .prefix("cookbook-")
            .tempdir()
            .map_err(|e| RecipeError::Write {
                path: std::env::temp_dir(),
                message: e.to_string(),
            })?;
        let document_path = workdir.path().join(DOCUMENT_NAME);
        fs::write(&document_path, document).map_err(|e| RecipeError::Write {
            path: document_path.clone(),
            message: e.to_string(),
        })?;

        let compilation = self.config.compiler.compile(workdir.path(), DOCUMENT_NAME)?;

        let output_path = self.output_path(file);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| RecipeError::Write {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        move_file(&compilation.artifact, &output_path).map_err(|e| RecipeError::Write {
            path: output_path.clone(),
            message: e.to_string(),
        })?;

        tracing::info!("Built {} -> {}", file.identifier, output_path.display());

        Ok(BuiltRecipe {
            identifier: file.identifier.clone(),
            output_path,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// For each recipe, the earlier source file whose artifact path it shares.
    ///
    /// `x.yml` and `x.yaml` in one directory map to the same artifact; the
    /// first in discovery order keeps it.
    fn earlier_claims(&self, recipes: &[RecipeFile]) -> Vec<Option<PathBuf>> {
        let mut owners: HashMap<PathBuf, &Path> = HashMap::new();

        recipes
            .iter()
            .map(|file| match owners.get(&self.output_path(file)) {
                Some(first) => Some(first.to_path_buf()),
                None => {
                    owners.insert(self.output_path(file), &file.path);
                    None
                }
            })
            .collect()
    }

    /// `<output>/<relative dir>/<stem>.<ext>`
    fn output_path(&self, file: &RecipeFile) -> PathBuf {
        self.config
            .output_dir
            .join(&file.relative)
            .with_extension(self.config.compiler.extension())
    }
}

/// Rename, falling back to copy when the scratch directory is on another filesystem.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    fs::copy(from, to)?;
    fs::remove_file(from)
}
