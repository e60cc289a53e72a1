//! Deterministic pattern-based conversion used when no provider is available.
//!
//! Recognizes a fixed table of function-call shapes such as
//! `squareroot(2x)` or `fraction(1, 2)`. Calls nest, and text around a
//! recognized call is kept as written. An instruction containing no
//! recognized call does not resolve.

use std::sync::LazyLock;

use regex::Regex;

/// A call shape: accepted names, argument count and the LaTeX it produces.
struct Shape {
    names: &'static [&'static str],
    arity: usize,
    render: fn(&[String]) -> String,
}

const SHAPES: &[Shape] = &[
    Shape {
        names: &["squareroot", "sqrt"],
        arity: 1,
        render: |a| format!("\\sqrt{{{}}}", a[0]),
    },
    Shape {
        names: &["root"],
        arity: 2,
        render: |a| format!("\\sqrt[{}]{{{}}}", a[0], a[1]),
    },
    Shape {
        names: &["fraction", "frac"],
        arity: 2,
        render: |a| format!("\\frac{{{}}}{{{}}}", a[0], a[1]),
    },
    Shape {
        names: &["integral"],
        arity: 3,
        render: |a| format!("\\int_{{{}}}^{{{}}} {} \\, dx", a[0], a[1], a[2]),
    },
    Shape {
        names: &["integral"],
        arity: 1,
        render: |a| format!("\\int {} \\, dx", a[0]),
    },
    Shape {
        names: &["sum"],
        arity: 3,
        render: |a| format!("\\sum_{{{}}}^{{{}}} {}", a[0], a[1], a[2]),
    },
    Shape {
        names: &["limit"],
        arity: 3,
        render: |a| format!("\\lim_{{{} \\to {}}} {}", a[0], a[1], a[2]),
    },
    Shape {
        names: &["power"],
        arity: 2,
        render: |a| format!("{{{}}}^{{{}}}", a[0], a[1]),
    },
    Shape {
        names: &["abs"],
        arity: 1,
        render: |a| format!("\\left| {} \\right|", a[0]),
    },
    Shape {
        names: &["vector"],
        arity: 1,
        render: |a| format!("\\vec{{{}}}", a[0]),
    },
    Shape {
        names: &["boxed"],
        arity: 1,
        render: |a| format!("\\boxed{{{}}}", a[0]),
    },
];

// Leftmost-first matching always starts at the first letter of a run, so a
// name is never read from the middle of a word. A leading coefficient such
// as the `2` in `2sqrt(x)` is not part of the name.
static CALL_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([a-z]+)\s*\(").expect("call pattern is valid"));

/// Calls nested deeper than this are kept as literal text.
const MAX_DEPTH: usize = 64;

/// Convert an instruction using the shape table.
///
/// Returns `None` when no known shape appears in the instruction.
///
/// ```
/// use mathscribe::convert::fallback_convert;
///
/// assert_eq!(fallback_convert("squareroot(2x)").as_deref(), Some("\\sqrt{2x}"));
/// assert_eq!(fallback_convert("the area of a circle"), None);
/// ```
pub fn fallback_convert(instruction: &str) -> Option<String> {
    let (latex, matched) = convert_fragment(instruction.trim(), 0);
    matched.then_some(latex)
}

fn is_known_name(name: &str) -> bool {
    SHAPES
        .iter()
        .any(|shape| shape.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
}

fn shape_for(name: &str, arity: usize) -> Option<&'static Shape> {
    SHAPES
        .iter()
        .find(|shape| shape.arity == arity && shape.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
}

fn convert_fragment(text: &str, depth: usize) -> (String, bool) {
    if depth > MAX_DEPTH {
        return (text.to_string(), false);
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut search_from = 0;
    let mut matched = false;

    while let Some(caps) = CALL_START.captures_at(text, search_from) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        // Unknown names are skipped, but their arguments may hold known calls.
        search_from = name.end();
        if !is_known_name(name.as_str()) {
            continue;
        }

        let open = whole.end() - 1;
        let Some(close) = matching_paren(text, open) else {
            continue;
        };
        let args = split_args(&text[open + 1..close]);
        let Some(shape) = shape_for(name.as_str(), args.len()) else {
            continue;
        };

        let converted: Vec<String> = args
            .iter()
            .map(|arg| convert_fragment(arg.trim(), depth + 1).0)
            .collect();
        out.push_str(&text[cursor..whole.start()]);
        out.push_str(&(shape.render)(&converted));
        cursor = close + 1;
        search_from = cursor;
        matched = true;
    }

    out.push_str(&text[cursor..]);
    (out, matched)
}

/// Index of the `)` closing the `(` at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are not nested in brackets.
fn split_args(inner: &str) -> Vec<&str> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth -= 1,
            ',' if depth == 0 => {
                args.push(&inner[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    args.push(&inner[start..]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squareroot() {
        assert_eq!(fallback_convert("squareroot(2x)").as_deref(), Some("\\sqrt{2x}"));
        assert_eq!(fallback_convert("  sqrt( y ) ").as_deref(), Some("\\sqrt{y}"));
    }

    #[test]
    fn test_fraction() {
        assert_eq!(fallback_convert("fraction(1,2)").as_deref(), Some("\\frac{1}{2}"));
        assert_eq!(fallback_convert("Fraction(a, b)").as_deref(), Some("\\frac{a}{b}"));
    }

    #[test]
    fn test_definite_integral() {
        assert_eq!(
            fallback_convert("integral(0, 1, x^2)").as_deref(),
            Some("\\int_{0}^{1} x^2 \\, dx")
        );
    }

    #[test]
    fn test_indefinite_integral() {
        assert_eq!(
            fallback_convert("integral(x)").as_deref(),
            Some("\\int x \\, dx")
        );
    }

    #[test]
    fn test_sum_limit_and_friends() {
        assert_eq!(
            fallback_convert("sum(i=1, n, i^2)").as_deref(),
            Some("\\sum_{i=1}^{n} i^2")
        );
        assert_eq!(
            fallback_convert("limit(x, 0, 1/x)").as_deref(),
            Some("\\lim_{x \\to 0} 1/x")
        );
        assert_eq!(fallback_convert("power(e, x)").as_deref(), Some("{e}^{x}"));
        assert_eq!(fallback_convert("root(3, 8)").as_deref(), Some("\\sqrt[3]{8}"));
        assert_eq!(fallback_convert("abs(x)").as_deref(), Some("\\left| x \\right|"));
        assert_eq!(fallback_convert("vector(v)").as_deref(), Some("\\vec{v}"));
        assert_eq!(fallback_convert("boxed(42)").as_deref(), Some("\\boxed{42}"));
    }

    #[test]
    fn test_nested_calls() {
        assert_eq!(
            fallback_convert("fraction(squareroot(2), 2)").as_deref(),
            Some("\\frac{\\sqrt{2}}{2}")
        );
    }

    #[test]
    fn test_surrounding_text_is_kept() {
        assert_eq!(
            fallback_convert("x = fraction(1, 2) + 1").as_deref(),
            Some("x = \\frac{1}{2} + 1")
        );
    }

    #[test]
    fn test_known_call_inside_unknown_call() {
        assert_eq!(
            fallback_convert("f(squareroot(x))").as_deref(),
            Some("f(\\sqrt{x})")
        );
    }

    #[test]
    fn test_leading_coefficient() {
        assert_eq!(fallback_convert("2sqrt(x)").as_deref(), Some("2\\sqrt{x}"));
        assert_eq!(
            fallback_convert("3fraction(1,2)").as_deref(),
            Some("3\\frac{1}{2}")
        );
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let levels = 5000;
        let instruction = format!("{}x{}", "sqrt(".repeat(levels), ")".repeat(levels));
        let latex = fallback_convert(&instruction).expect("outer calls resolve");
        assert!(latex.starts_with("\\sqrt{\\sqrt{"));
        // Past the depth limit the remaining calls stay as written.
        assert!(latex.contains("sqrt(sqrt("));
    }

    #[test]
    fn test_nesting_within_limit_is_fully_converted() {
        let instruction = format!("{}x{}", "sqrt(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        let latex = fallback_convert(&instruction).unwrap();
        assert!(!latex.contains('('));
        assert_eq!(latex.matches("\\sqrt{").count(), MAX_DEPTH);
    }

    #[test]
    fn test_unknown_shapes_do_not_resolve() {
        assert_eq!(fallback_convert("x squared plus one"), None);
        assert_eq!(fallback_convert("sin(x)"), None);
        assert_eq!(fallback_convert(""), None);
    }

    #[test]
    fn test_wrong_arity_does_not_resolve() {
        assert_eq!(fallback_convert("fraction(1)"), None);
        assert_eq!(fallback_convert("squareroot()"), None);
    }

    #[test]
    fn test_unbalanced_call_does_not_resolve() {
        assert_eq!(fallback_convert("squareroot(2x"), None);
    }
}
