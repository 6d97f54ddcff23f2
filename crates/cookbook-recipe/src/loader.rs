//! Recipe discovery and loading.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::model::Recipe;
use crate::parser::{parse_recipe, ParseError};

/// Directory name reserved for recipe illustrations.
const IMAGES_DIR: &str = "images";

/// Errors that can occur while loading a recipe file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid recipe {path}: {message}")]
    Schema { path: PathBuf, message: String },
}

impl LoadError {
    /// Short label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Read { .. } => "read",
            LoadError::Parse { .. } => "parse",
            LoadError::Schema { .. } => "schema",
        }
    }

    /// The file the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Read { path, .. }
            | LoadError::Parse { path, .. }
            | LoadError::Schema { path, .. } => path,
        }
    }
}

/// A recipe source file found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeFile {
    /// Full path to the file
    pub path: PathBuf,

    /// Path relative to the source directory
    pub relative: PathBuf,

    /// Relative path without extension, `/`-separated (e.g. `desserts/pie`)
    pub identifier: String,
}

impl RecipeFile {
    fn new(root: &Path, path: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let identifier = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Self {
            path: path.to_path_buf(),
            relative,
            identifier,
        }
    }

    /// Read, parse and normalize this recipe.
    pub fn load(&self) -> Result<Recipe, LoadError> {
        let content = fs::read_to_string(&self.path).map_err(|e| LoadError::Read {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let mut recipe = parse_recipe(&content).map_err(|e| match e {
            ParseError::Yaml(message) => LoadError::Parse {
                path: self.path.clone(),
                message,
            },
            ParseError::Schema(message) => LoadError::Schema {
                path: self.path.clone(),
                message,
            },
        })?;

        if let Some(image) = recipe.image.take() {
            recipe.image = Some(self.resolve_image(&image)?);
        }

        Ok(recipe)
    }

    /// Resolve an image path against the recipe's directory.
    fn resolve_image(&self, image: &Path) -> Result<PathBuf, LoadError> {
        let base = self.path.parent().unwrap_or(Path::new(""));
        let candidate = base.join(image);

        fs::canonicalize(&candidate)
            .ok()
            .filter(|p| p.is_file())
            .ok_or_else(|| LoadError::Schema {
                path: self.path.clone(),
                message: format!("image file does not exist: {}", candidate.display()),
            })
    }
}

/// Lazy iterator over the recipe files in a source tree.
pub struct RecipeFiles {
    root: PathBuf,
    walker: walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
}

impl RecipeFiles {
    /// Start walking `root`. Fails if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let root = root.into();

        if !root.is_dir() {
            return Err(LoadError::Read {
                path: root,
                message: "source directory not found".to_string(),
            });
        }

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(is_visible as fn(&DirEntry) -> bool);

        Ok(Self { root, walker })
    }
}

impl Iterator for RecipeFiles {
    type Item = Result<RecipeFile, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(&self.root).to_path_buf();
                    return Some(Err(LoadError::Read {
                        path,
                        message: e.to_string(),
                    }));
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !is_recipe_file(path) {
                tracing::warn!("Skipping {}: not a recipe file", path.display());
                continue;
            }

            return Some(Ok(RecipeFile::new(&self.root, path)));
        }
    }
}

/// Collect every recipe file under `root`.
pub fn discover(root: impl Into<PathBuf>) -> Result<Vec<RecipeFile>, LoadError> {
    RecipeFiles::new(root)?.collect()
}

/// Lazily load every recipe under `root` as `(identifier, recipe)` pairs.
pub fn load_recipes(
    root: impl Into<PathBuf>,
) -> Result<impl Iterator<Item = Result<(String, Recipe), LoadError>>, LoadError> {
    let files = RecipeFiles::new(root)?;

    Ok(files.map(|file| -> Result<(String, Recipe), LoadError> {
        let file = file?;
        let recipe = file.load()?;
        Ok((file.identifier, recipe))
    }))
}

/// Hidden entries and illustration directories are never walked.
fn is_visible(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }

    !(entry.file_type().is_dir() && name == IMAGES_DIR)
}

fn is_recipe_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}
