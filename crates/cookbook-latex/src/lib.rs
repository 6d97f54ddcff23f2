//! Document rendering for cookbook recipes.
//!
//! Renders each recipe into a LaTeX document from a fixed template, compiles it
//! with an external TeX engine, and places the resulting PDF in the output tree.

pub mod builder;
pub mod compiler;
pub mod templates;
pub mod typography;

pub use builder::{
    BuildConfig, BuildError, BuildSummary, BuiltRecipe, CookbookBuilder, RecipeError,
    RecipeFailure,
};
pub use compiler::{Compilation, CompileError, Compiler};
pub use templates::RecipeTemplate;
