//! Normalized recipe records.

use std::path::PathBuf;

use serde::Serialize;

/// A recipe, normalized from one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    /// Recipe title (never empty)
    pub name: String,

    /// Number of servings, display only
    pub servings: Option<String>,

    /// Preparation time, display only
    pub time: Option<String>,

    /// Illustration file
    pub image: Option<PathBuf>,

    /// Steps in rendering order
    pub steps: Vec<Step>,

    /// Free-text notes shown after the steps
    pub notes: Option<String>,
}

/// One rendering unit within a recipe.
///
/// Serialized with a `kind` tag so templates can branch on a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Section heading with no body.
    Section { title: String },

    /// Ingredient list beside the instruction that uses it.
    Ingredients {
        ingredients: Vec<String>,
        text: String,
    },

    /// Full-width instruction paragraph.
    Instruction { text: String },
}

impl Step {
    /// Tag name of this step's variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Section { .. } => "section",
            Step::Ingredients { .. } => "ingredients",
            Step::Instruction { .. } => "instruction",
        }
    }
}
