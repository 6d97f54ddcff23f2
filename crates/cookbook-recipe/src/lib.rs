//! Recipe loading for cookbook.
//!
//! This crate discovers recipe YAML files in a source tree, parses them, and
//! normalizes each one into a [`Recipe`] ready for rendering.

pub mod loader;
pub mod model;
pub mod parser;

pub use loader::{discover, load_recipes, LoadError, RecipeFile, RecipeFiles};
pub use model::{Recipe, Step};
pub use parser::{parse_recipe, ParseError};
