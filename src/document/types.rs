//! Core document types.

use std::ops::Range;

use serde::Serialize;

/// A run of the source document, as produced by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Prose, trimmed.
    Text(String),
    /// Text found between a delimiter pair, exactly as written.
    ///
    /// The untrimmed form is the cache key; converters see it trimmed.
    Instruction(String),
}

impl Segment {
    /// The segment's text.
    pub fn content(&self) -> &str {
        match self {
            Self::Text(content) | Self::Instruction(content) => content,
        }
    }
}

/// A segment together with the byte range it was read from.
///
/// For instructions the range covers both delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub segment: Segment,
    pub span: Range<usize>,
}

/// Display-ready form of a segment after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum RenderedSegment {
    Text(String),
    Latex(String),
    /// An instruction still waiting on the provider; carries the instruction text.
    Placeholder(String),
}

impl RenderedSegment {
    pub fn content(&self) -> &str {
        match self {
            Self::Text(content) | Self::Latex(content) | Self::Placeholder(content) => content,
        }
    }

    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}
