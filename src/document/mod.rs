//! Document segmentation.
//!
//! This module handles:
//! - Splitting source text into prose and `*instruction*` runs
//! - The segment types shared with the reconciler
//! - Rendering reconciled segments as a plain-text preview

mod extractor;
mod types;

pub use extractor::{DELIMITER, SpannedSegments, extract, extract_spanned};
pub use types::{RenderedSegment, Segment, Spanned};

/// Render reconciled segments for a terminal preview.
///
/// LaTeX is shown inline between `$` signs; instructions that are still
/// converting show their source text so progress is visible.
pub fn render_preview(segments: &[RenderedSegment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            RenderedSegment::Text(text) => text.clone(),
            RenderedSegment::Latex(latex) => format!("${latex}$"),
            RenderedSegment::Placeholder(instruction) => {
                format!("[converting: {}]", instruction.trim())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
