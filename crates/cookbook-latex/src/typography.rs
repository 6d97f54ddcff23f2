//! Typographic shorthands in recipe text.
//!
//! Recipe authors write `1/2` for fractions and `\0` for the degree sign.
//! These are rewritten into the LaTeX macros the template's preamble loads.
//! Nothing else is touched: other LaTeX special characters pass through as-is.

use std::sync::LazyLock;

use regex::Regex;

static FRACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/(\d+)").expect("Invalid fraction regex"));

static DEGREE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\0").expect("Invalid degree regex"));

/// Rewrite fraction and degree shorthands in a text field.
pub fn typeset(value: String) -> String {
    let value = FRACTION_RE.replace_all(&value, r"\nicefrac{${1}}{${2}}");
    // `{}` ends the macro name so a following space survives.
    DEGREE_RE.replace_all(&value, r"\degree{}").into_owned()
}
