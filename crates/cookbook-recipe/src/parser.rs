//! Recipe YAML parsing.

use std::path::PathBuf;

use serde::Deserialize;

use crate::model::{Recipe, Step};

/// Errors that can occur when parsing a recipe document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid YAML: {0}")]
    Yaml(String),

    #[error("{0}")]
    Schema(String),
}

/// Recipe document as written. Unknown keys are ignored.
///
/// Plain scalars such as `1.50` deserialize into `String` with their source
/// text intact, so display fields are kept as strings.
#[derive(Debug, Deserialize)]
struct RawRecipe {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    servings: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    ingredients: Option<Vec<String>>,
    #[serde(default)]
    text: Option<String>,
}

/// Parse a recipe document.
///
/// The image path is kept exactly as written; resolving it against the
/// recipe's location is the loader's job.
pub fn parse_recipe(source: &str) -> Result<Recipe, ParseError> {
    let raw: RawRecipe =
        serde_yaml::from_str(source).map_err(|e| ParseError::Yaml(e.to_string()))?;

    let name = non_blank(raw.name)
        .ok_or_else(|| ParseError::Schema("required key name missing".to_string()))?;

    let steps = raw
        .steps
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, step)| convert_step(i + 1, step))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Recipe {
        name,
        servings: non_blank(raw.servings),
        time: non_blank(raw.time),
        image: non_blank(raw.image).map(PathBuf::from),
        steps,
        notes: non_blank(raw.notes),
    })
}

/// Resolve a step's variant: `section`, then `ingredients`, then `text`.
fn convert_step(index: usize, raw: RawStep) -> Result<Step, ParseError> {
    if let Some(section) = raw.section {
        if raw.ingredients.is_some() || raw.text.is_some() {
            tracing::warn!(
                "Step {} has a section key alongside other keys; treating it as a section",
                index
            );
        }
        let title = non_blank(Some(section))
            .ok_or_else(|| invalid_step(index, "section", "title is empty"))?;
        return Ok(Step::Section { title });
    }

    if let Some(ingredients) = raw.ingredients {
        if ingredients.is_empty() {
            return Err(invalid_step(index, "ingredients", "ingredient list is empty"));
        }
        if let Some(pos) = ingredients.iter().position(|s| s.trim().is_empty()) {
            return Err(invalid_step(
                index,
                "ingredients",
                &format!("ingredient {} is empty", pos + 1),
            ));
        }
        let text = non_blank(raw.text)
            .ok_or_else(|| invalid_step(index, "ingredients", "text is missing"))?;
        return Ok(Step::Ingredients { ingredients, text });
    }

    match non_blank(raw.text) {
        Some(text) => Ok(Step::Instruction { text }),
        None => Err(ParseError::Schema(format!(
            "step {} has none of section, ingredients or text",
            index
        ))),
    }
}

fn invalid_step(index: usize, kind: &str, reason: &str) -> ParseError {
    ParseError::Schema(format!("invalid {} step {}: {}", kind, index, reason))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_pancakes() {
        let source = r#"
name: Pancakes
servings: "4"
steps:
  - section: Batter
  - ingredients: ["1 cup flour", "1 egg"]
    text: Whisk together.
"#;

        let recipe = parse_recipe(source).unwrap();

        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.servings.as_deref(), Some("4"));
        assert_eq!(recipe.time, None);
        assert_eq!(recipe.image, None);
        assert_eq!(
            recipe.steps,
            vec![
                Step::Section {
                    title: "Batter".to_string()
                },
                Step::Ingredients {
                    ingredients: vec!["1 cup flour".to_string(), "1 egg".to_string()],
                    text: "Whisk together.".to_string(),
                },
            ]
        );
    }

    #[test]
    fn missing_name_is_schema_error() {
        let result = parse_recipe("servings: 2\nsteps: []\n");

        assert!(matches!(result, Err(ParseError::Schema(_))));
    }

    #[test]
    fn blank_name_is_schema_error() {
        let result = parse_recipe("name: '  '\n");

        assert!(matches!(result, Err(ParseError::Schema(_))));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let result = parse_recipe("name: [unclosed\n");

        assert!(matches!(result, Err(ParseError::Yaml(_))));
    }

    #[test]
    fn top_level_sequence_is_parse_error() {
        let result = parse_recipe("- name: Pancakes\n");

        assert!(matches!(result, Err(ParseError::Yaml(_))));
    }

    #[test]
    fn steps_may_be_absent() {
        let recipe = parse_recipe("name: Toast\n").unwrap();

        assert!(recipe.steps.is_empty());
    }

    #[test]
    fn plain_scalars_keep_source_text() {
        let source = r#"
name: 123
servings: 1.50
time: 2.0
steps:
  - ingredients: [0.50, 1e3, 2]
    text: Mix.
"#;

        let recipe = parse_recipe(source).unwrap();

        assert_eq!(recipe.name, "123");
        assert_eq!(recipe.servings.as_deref(), Some("1.50"));
        assert_eq!(recipe.time.as_deref(), Some("2.0"));
        assert_eq!(
            recipe.steps[0],
            Step::Ingredients {
                ingredients: vec!["0.50".to_string(), "1e3".to_string(), "2".to_string()],
                text: "Mix.".to_string(),
            }
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let source = "name: Tea\nauthor: someone\nsteps:\n  - text: Steep.\n    colour: red\n";

        let recipe = parse_recipe(source).unwrap();

        assert_eq!(
            recipe.steps,
            vec![Step::Instruction {
                text: "Steep.".to_string()
            }]
        );
    }

    #[test]
    fn section_wins_over_other_keys() {
        let source = r#"
name: Odd
steps:
  - section: Sauce
    ingredients: [butter]
    text: Melt.
  - ingredients: [salt]
    text: Season.
"#;

        let recipe = parse_recipe(source).unwrap();

        assert_eq!(recipe.steps[0].kind(), "section");
        assert_eq!(recipe.steps[1].kind(), "ingredients");
    }

    #[test]
    fn ingredients_without_text_is_schema_error() {
        let source = "name: Salad\nsteps:\n  - ingredients: [lettuce]\n";

        let err = parse_recipe(source).unwrap_err();

        assert!(matches!(err, ParseError::Schema(_)));
        assert!(err.to_string().contains("step 1"));
    }

    #[test]
    fn empty_ingredient_list_is_schema_error() {
        let source = "name: Salad\nsteps:\n  - ingredients: []\n    text: Toss.\n";

        assert!(matches!(parse_recipe(source), Err(ParseError::Schema(_))));
    }

    #[test]
    fn blank_ingredient_is_schema_error() {
        let source = "name: Salad\nsteps:\n  - ingredients: [lettuce, '', tomato]\n    text: Toss.\n";

        let err = parse_recipe(source).unwrap_err();

        assert!(matches!(err, ParseError::Schema(_)));
        assert!(err.to_string().contains("ingredient 2 is empty"));
    }

    #[test]
    fn step_without_known_keys_is_schema_error() {
        let source = "name: Salad\nsteps:\n  - text: Wash.\n  - colour: green\n";

        let err = parse_recipe(source).unwrap_err();

        assert!(err.to_string().contains("step 2"));
    }

    #[test]
    fn blank_optionals_are_absent() {
        let source = "name: Soup\nservings:\ntime: ''\nnotes: ' '\nimage:\n";

        let recipe = parse_recipe(source).unwrap();

        assert_eq!(recipe.servings, None);
        assert_eq!(recipe.time, None);
        assert_eq!(recipe.notes, None);
        assert_eq!(recipe.image, None);
    }

    #[test]
    fn keeps_image_path_as_written() {
        let recipe = parse_recipe("name: Pie\nimage: images/pie.jpg\n").unwrap();

        assert_eq!(recipe.image, Some(PathBuf::from("images/pie.jpg")));
    }
}
