//! LaTeX template for rendering recipes.
//!
//! Placeholders use `<{ … }>`, blocks `<% … %>` and comments `<# … #>` so the
//! template syntax never collides with LaTeX braces or `%` comments.
//!
//! Field values are inserted verbatim. LaTeX special characters such as `%`,
//! `&`, `#` or `_` are not escaped and will usually make the document fail
//! to compile.

use minijinja::syntax::SyntaxConfig;
use minijinja::{context, AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

use cookbook_recipe::{Recipe, Step};

const TEMPLATE_NAME: &str = "recipe.tex";

/// Template context for one recipe.
#[derive(Debug, Clone, Serialize)]
pub struct Context<'a> {
    /// Recipe title
    pub name: &'a str,
    /// Servings cell, empty when absent
    pub servings: &'a str,
    /// Time cell, empty when absent
    pub time: &'a str,
    /// Absolute illustration path
    pub image: Option<String>,
    /// Steps in order
    pub steps: &'a [Step],
    /// Trailing notes
    pub notes: Option<&'a str>,
}

impl<'a> From<&'a Recipe> for Context<'a> {
    fn from(recipe: &'a Recipe) -> Self {
        Self {
            name: &recipe.name,
            servings: recipe.servings.as_deref().unwrap_or(""),
            time: recipe.time.as_deref().unwrap_or(""),
            image: recipe.image.as_ref().map(|p| p.display().to_string()),
            steps: &recipe.steps,
            notes: recipe.notes.as_deref(),
        }
    }
}

/// The recipe document template.
#[derive(Clone)]
pub struct RecipeTemplate {
    env: Environment<'static>,
}

impl RecipeTemplate {
    /// Create the template with the typography pass enabled.
    pub fn new() -> Self {
        Self::with_typography(true)
    }

    /// Create the template, choosing whether text fields get the
    /// fraction and degree rewrites.
    pub fn with_typography(typography: bool) -> Self {
        let mut env = Environment::new();

        let syntax = SyntaxConfig::builder()
            .block_delimiters("<%", "%>")
            .variable_delimiters("<{", "}>")
            .comment_delimiters("<#", "#>")
            .build()
            .expect("Invalid template syntax");
        env.set_syntax(syntax);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        if typography {
            env.add_filter("typeset", crate::typography::typeset);
        } else {
            env.add_filter("typeset", |value: String| value);
        }

        env.add_template(TEMPLATE_NAME, RECIPE_TEMPLATE)
            .expect("Failed to add recipe template");

        Self { env }
    }

    /// Render a recipe into a complete LaTeX document.
    pub fn render(&self, recipe: &Recipe) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(TEMPLATE_NAME)?;

        tmpl.render(context! {
            recipe => Context::from(recipe),
        })
    }
}

impl Default for RecipeTemplate {
    fn default() -> Self {
        Self::new()
    }
}

const RECIPE_TEMPLATE: &str = r##"\documentclass[11pt]{article}
\usepackage[T1]{fontenc}
\usepackage[utf8]{inputenc}
\usepackage[margin=0.75in]{geometry}
\usepackage{graphicx}
\usepackage{nicefrac}
\usepackage{gensymb}
\usepackage{tabularx}
\usepackage{enumitem}

\pagestyle{empty}
\setlength{\parindent}{0pt}

\newcommand{\recipesection}[1]{%
  \par\bigskip{\large\bfseries #1}\par\smallskip}
\newcommand{\ingredientrow}[2]{%
  \par\noindent
  \begin{minipage}[t]{0.32\textwidth}
    \begin{itemize}[leftmargin=*,nosep]
      #1
    \end{itemize}
  \end{minipage}\hfill
  \begin{minipage}[t]{0.64\textwidth}
    #2
  \end{minipage}\par\medskip}
\newcommand{\instruction}[1]{%
  \par\noindent #1\par\medskip}
\newcommand{\recipenotes}[1]{%
  \par\bigskip\hrule\medskip
  {\bfseries Notes}\par\smallskip
  #1\par}

\begin{document}
<% if recipe.image %>
\begin{center}
  \fbox{\includegraphics[width=0.6\textwidth,height=0.35\textheight,keepaspectratio]{<{ recipe.image }>}}
\end{center}
<% endif %>
\begin{tabularx}{\textwidth}{@{}X r@{}}
  {\LARGE\bfseries <{ recipe.name | typeset }>} & <{ recipe.servings | typeset }> \\
  & <{ recipe.time | typeset }> \\
\end{tabularx}
\medskip\hrule\medskip
<% for step in recipe.steps %>
<% if step.kind == "section" %>
\recipesection{<{ step.title | typeset }>}
<% elif step.kind == "ingredients" %>
\ingredientrow{%
<% for ingredient in step.ingredients %>
  \item <{ ingredient | typeset }>
<% endfor %>
}{<{ step.text | typeset }>}
<% else %>
\instruction{<{ step.text | typeset }>}
<% endif %>
<% endfor %>
<% if recipe.notes %>
\recipenotes{<{ recipe.notes | typeset }>}
<% endif %>
\end{document}
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use regex::Regex;
    use std::path::PathBuf;

    fn pancakes() -> Recipe {
        Recipe {
            name: "Pancakes".to_string(),
            servings: Some("4".to_string()),
            time: None,
            image: None,
            steps: vec![
                Step::Section {
                    title: "Batter".to_string(),
                },
                Step::Ingredients {
                    ingredients: vec!["1 cup flour".to_string(), "1 egg".to_string()],
                    text: "Whisk together.".to_string(),
                },
            ],
            notes: None,
        }
    }

    /// Recover the steps from a rendered document's body.
    fn extract_steps(document: &str) -> Vec<Step> {
        let re = Regex::new(
            r"(?s)\\recipesection\{(?P<title>[^\n]*)\}\n|\\ingredientrow\{%\n(?P<items>.*?)\n\}\{(?P<text>.*?)\}\n|\\instruction\{(?P<instruction>.*?)\}\n",
        )
        .unwrap();
        let body = &document[document.find(r"\begin{document}").unwrap()..];

        re.captures_iter(body)
            .map(|caps| {
                if let Some(title) = caps.name("title") {
                    Step::Section {
                        title: title.as_str().to_string(),
                    }
                } else if let Some(items) = caps.name("items") {
                    Step::Ingredients {
                        ingredients: items
                            .as_str()
                            .lines()
                            .map(|l| l.trim().trim_start_matches(r"\item ").to_string())
                            .collect(),
                        text: caps["text"].to_string(),
                    }
                } else {
                    Step::Instruction {
                        text: caps["instruction"].to_string(),
                    }
                }
            })
            .collect()
    }

    #[test]
    fn renders_pancakes() {
        let doc = RecipeTemplate::new().render(&pancakes()).unwrap();

        assert!(doc.contains(r"{\LARGE\bfseries Pancakes} & 4 \\"));
        assert!(doc.contains(r"\recipesection{Batter}"));
        assert!(doc.contains("  \\item 1 cup flour\n  \\item 1 egg\n}{Whisk together.}"));
        assert!(doc.trim_end().ends_with(r"\end{document}"));
    }

    #[test]
    fn absent_time_renders_empty_cell() {
        let doc = RecipeTemplate::new().render(&pancakes()).unwrap();

        assert!(doc.contains("  &  \\\\\n\\end{tabularx}"));
    }

    #[test]
    fn steps_round_trip_in_order() {
        let mut recipe = pancakes();
        recipe.steps.push(Step::Instruction {
            text: "Fry until golden.\n\nServe warm.".to_string(),
        });
        recipe.steps.push(Step::Section {
            title: "Topping".to_string(),
        });

        let doc = RecipeTemplate::new().render(&recipe).unwrap();

        assert_eq!(extract_steps(&doc), recipe.steps);
    }

    #[test]
    fn renders_empty_body_without_steps() {
        let mut recipe = pancakes();
        recipe.steps.clear();

        let doc = RecipeTemplate::new().render(&recipe).unwrap();

        assert!(extract_steps(&doc).is_empty());
        assert!(doc.contains(r"\end{document}"));
    }

    #[test]
    fn omits_image_block_when_absent() {
        let doc = RecipeTemplate::new().render(&pancakes()).unwrap();

        assert!(!doc.contains(r"\includegraphics"));
        assert!(!doc.contains(r"\fbox"));
    }

    #[test]
    fn references_image_exactly_once() {
        let mut recipe = pancakes();
        recipe.image = Some(PathBuf::from("/recipes/images/pancakes.jpg"));

        let doc = RecipeTemplate::new().render(&recipe).unwrap();

        assert_eq!(doc.matches("/recipes/images/pancakes.jpg").count(), 1);
        assert_eq!(doc.matches(r"\includegraphics").count(), 1);
    }

    #[test]
    fn image_path_skips_typography() {
        let mut recipe = pancakes();
        recipe.image = Some(PathBuf::from("/photos/2024/1/2.jpg"));

        let doc = RecipeTemplate::new().render(&recipe).unwrap();

        assert!(doc.contains("{/photos/2024/1/2.jpg}"));
    }

    #[test]
    fn notes_follow_rule_only_when_present() {
        let without = RecipeTemplate::new().render(&pancakes()).unwrap();
        assert!(!without.contains(r"\recipenotes{"));

        let mut recipe = pancakes();
        recipe.notes = Some("Best with maple syrup.".to_string());
        let with = RecipeTemplate::new().render(&recipe).unwrap();

        let notes_at = with.find(r"\recipenotes{Best with maple syrup.}").unwrap();
        let last_step_at = with.find(r"\ingredientrow{").unwrap();
        assert!(notes_at > last_step_at);
    }

    #[test]
    fn reserved_characters_pass_through_unescaped() {
        let mut recipe = pancakes();
        recipe.steps = vec![Step::Instruction {
            text: "Use 50% butter & salt".to_string(),
        }];

        let doc = RecipeTemplate::new().render(&recipe).unwrap();

        assert!(doc.contains(r"\instruction{Use 50% butter & salt}"));
    }

    #[test]
    fn applies_typography_to_text() {
        let mut recipe = pancakes();
        recipe.steps = vec![Step::Ingredients {
            ingredients: vec!["1/2 cup milk".to_string()],
            text: r"Heat to 180\0C.".to_string(),
        }];

        let doc = RecipeTemplate::new().render(&recipe).unwrap();

        assert!(doc.contains(r"\item \nicefrac{1}{2} cup milk"));
        assert!(doc.contains(r"{Heat to 180\degree{}C.}"));
    }

    #[test]
    fn typography_can_be_disabled() {
        let mut recipe = pancakes();
        recipe.steps = vec![Step::Instruction {
            text: "Add 1/2 cup.".to_string(),
        }];

        let doc = RecipeTemplate::with_typography(false)
            .render(&recipe)
            .unwrap();

        assert!(doc.contains(r"\instruction{Add 1/2 cup.}"));
    }
}
