//! Splits a document into prose and instruction runs.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Segment, Spanned};

/// Character that opens and closes an instruction.
pub const DELIMITER: char = '*';

/// A complete delimiter pair, non-greedy, allowed to span lines.
static INSTRUCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\*(.*?)\*").expect("instruction pattern is valid"));

/// Lazy iterator over the segments of a document.
///
/// Holds only offsets into the borrowed source, so cloning it (or calling
/// [`extract_spanned`] again) restarts the scan with identical results.
#[derive(Debug, Clone)]
pub struct SpannedSegments<'a> {
    source: &'a str,
    cursor: usize,
    queued: Option<Spanned>,
    finished: bool,
}

impl<'a> SpannedSegments<'a> {
    const fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            queued: None,
            finished: false,
        }
    }

    fn text_at(&self, start: usize, end: usize) -> Option<Spanned> {
        let run = &self.source[start..end];
        let trimmed = run.trim();
        if trimmed.is_empty() {
            return None;
        }
        let offset = start + (run.len() - run.trim_start().len());
        Some(Spanned {
            segment: Segment::Text(trimmed.to_string()),
            span: offset..offset + trimmed.len(),
        })
    }
}

impl Iterator for SpannedSegments<'_> {
    type Item = Spanned;

    fn next(&mut self) -> Option<Spanned> {
        loop {
            if let Some(queued) = self.queued.take() {
                return Some(queued);
            }
            if self.finished {
                return None;
            }

            let Some(caps) = INSTRUCTION.captures_at(self.source, self.cursor) else {
                self.finished = true;
                return self.text_at(self.cursor, self.source.len());
            };
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                self.finished = true;
                return None;
            };

            let before_start = self.cursor;
            self.cursor = whole.end();
            if !inner.as_str().trim().is_empty() {
                self.queued = Some(Spanned {
                    segment: Segment::Instruction(inner.as_str().to_string()),
                    span: whole.range(),
                });
            }
            if let Some(text) = self.text_at(before_start, whole.start()) {
                return Some(text);
            }
        }
    }
}

impl std::iter::FusedIterator for SpannedSegments<'_> {}

/// Extract segments together with their source spans.
pub const fn extract_spanned(source: &str) -> SpannedSegments<'_> {
    SpannedSegments::new(source)
}

/// Extract the ordered segment sequence of `source`.
///
/// ```
/// use mathscribe::document::{Segment, extract};
///
/// let segments: Vec<_> = extract("*squareroot(2x)* is steep").collect();
/// assert_eq!(
///     segments,
///     vec![
///         Segment::Instruction("squareroot(2x)".to_string()),
///         Segment::Text("is steep".to_string()),
///     ]
/// );
/// ```
pub fn extract(source: &str) -> impl Iterator<Item = Segment> + Clone + '_ {
    extract_spanned(source).map(|spanned| spanned.segment)
}
