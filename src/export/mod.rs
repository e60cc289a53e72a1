//! LaTeX document assembly and PDF export.
//!
//! The reconciled segments are wrapped into a standalone `article`
//! document and handed to a [`Compiler`] chain: a local TeX engine first,
//! then an optional remote compile service.

mod compiler;

pub use compiler::{
    Compiler, CompilerChain, DEFAULT_ENGINE, LocalCompiler, RemoteCompiler, log_tail,
};

use std::fmt::Write as _;

use crate::document::RenderedSegment;

const PREAMBLE: &str = "\\documentclass{article}\n\
\\usepackage[utf8]{inputenc}\n\
\\usepackage{amsmath}\n\
\\usepackage{amssymb}\n";

/// Escape LaTeX special characters in prose.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(ch),
        }
    }
    out
}

/// Body markup for reconciled segments.
///
/// LaTeX segments become inline math. Placeholders never reach export;
/// any left over are skipped.
pub fn body_markup(segments: &[RenderedSegment]) -> String {
    let mut body = String::new();
    for segment in segments {
        let piece = match segment {
            RenderedSegment::Text(text) => escape_text(text),
            RenderedSegment::Latex(latex) => format!("${latex}$"),
            RenderedSegment::Placeholder(_) => continue,
        };
        if !body.is_empty() && !body.ends_with('\n') {
            body.push(' ');
        }
        body.push_str(&piece);
    }
    body
}

/// A complete, compilable LaTeX document.
///
/// ```
/// use mathscribe::document::RenderedSegment;
/// use mathscribe::export::document_markup;
///
/// let markup = document_markup(&[RenderedSegment::Latex("\\sqrt{2}".to_string())]);
/// assert!(markup.contains("$\\sqrt{2}$"));
/// assert!(markup.ends_with("\\end{document}\n"));
/// ```
pub fn document_markup(segments: &[RenderedSegment]) -> String {
    let mut markup = String::from(PREAMBLE);
    let _ = write!(
        markup,
        "\n\\begin{{document}}\n\n{}\n\n\\end{{document}}\n",
        body_markup(segments)
    );
    markup
}
