//! Escapes bare math command names that a converter forgot to prefix.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Command names that are escaped when they appear bare.
pub const KNOWN_COMMANDS: &[&str] = &[
    "int", "iint", "oint", "sum", "prod", "sqrt", "frac", "lim", "sin", "cos", "tan", "sec",
    "csc", "cot", "arcsin", "arccos", "arctan", "sinh", "cosh", "tanh", "log", "ln", "exp",
    "nabla", "vec", "cdot", "times", "boxed", "partial", "infty",
];

// Maximal letter runs, so `sinh` is never read as `sin` and `int_0` still
// counts as a bare `int`.
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("word pattern is valid"));

// Prose bodies whose words are never commands.
static PROSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:text|textrm|textit|textbf|mathrm|operatorname|mbox)\s*\{[^{}]*\}")
        .expect("prose pattern is valid")
});

/// Prefix bare known command names with `\`.
///
/// Words inside `\text{..}` and similar prose groups are left alone.
///
/// ```
/// use mathscribe::convert::normalize_latex;
///
/// assert_eq!(normalize_latex("sqrt{2} + \\sqrt{3}"), "\\sqrt{2} + \\sqrt{3}");
/// ```
pub fn normalize_latex(latex: &str) -> String {
    let prose: Vec<Range<usize>> = PROSE.find_iter(latex).map(|m| m.range()).collect();
    WORD.replace_all(latex, |caps: &Captures<'_>| {
        let word = &caps[0];
        let start = caps.get(0).map_or(0, |m| m.start());
        let in_prose = prose.iter().any(|range| range.contains(&start));
        if KNOWN_COMMANDS.contains(&word) && !in_prose && !latex[..start].ends_with('\\') {
            format!("\\{word}")
        } else {
            word.to_string()
        }
    })
    .into_owned()
}
