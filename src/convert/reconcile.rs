//! Cache lookup, batch planning and merge.

use tracing::{debug, warn};

use super::cache::ConversionCache;
use super::fallback::fallback_convert;
use super::normalize::normalize_latex;
use crate::document::{RenderedSegment, Segment};

/// An instruction waiting on the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingInstruction {
    /// Index of its placeholder in `segments`.
    position: usize,
    /// Exact instruction text, used as the cache key.
    instruction: String,
}

/// A planned reconciliation: rendered segments with placeholders for
/// every instruction the cache could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    segments: Vec<RenderedSegment>,
    pending: Vec<PendingInstruction>,
}

/// Final segments of a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub segments: Vec<RenderedSegment>,
    /// Instructions nothing could resolve; they are left out of `segments`.
    pub dropped: Vec<String>,
}

/// Resolve cached instructions and mark the rest pending.
pub fn plan(segments: impl IntoIterator<Item = Segment>, cache: &ConversionCache) -> Reconciliation {
    let mut rendered = Vec::new();
    let mut pending = Vec::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => rendered.push(RenderedSegment::Text(text)),
            Segment::Instruction(instruction) => {
                if let Some(latex) = cache.get(&instruction) {
                    rendered.push(RenderedSegment::Latex(latex.to_string()));
                } else {
                    pending.push(PendingInstruction {
                        position: rendered.len(),
                        instruction: instruction.clone(),
                    });
                    rendered.push(RenderedSegment::Placeholder(instruction));
                }
            }
        }
    }
    debug!(
        segments = rendered.len(),
        pending = pending.len(),
        "planned reconciliation"
    );
    Reconciliation {
        segments: rendered,
        pending,
    }
}

impl Reconciliation {
    /// Segments as they should be shown right now, placeholders included.
    pub fn segments(&self) -> &[RenderedSegment] {
        &self.segments
    }

    /// True when every instruction was answered from the cache.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Trimmed pending instructions in document order, duplicates included.
    pub fn batch(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|pending| pending.instruction.trim().to_string())
            .collect()
    }

    /// Merge a successful provider reply.
    ///
    /// Position `i` of `reply` answers pending instruction `i`. Positions the
    /// reply does not cover go through the fallback converter one by one.
    /// Every resolution is normalized and written to `cache`; instructions
    /// that stay unresolved are dropped from the output.
    pub fn merge(self, reply: Vec<String>, cache: &mut ConversionCache) -> Reconciled {
        if reply.len() > self.pending.len() {
            warn!(
                expected = self.pending.len(),
                received = reply.len(),
                "provider returned extra results, ignoring the surplus"
            );
        } else if reply.len() < self.pending.len() {
            debug!(
                covered = reply.len(),
                backfill = self.pending.len() - reply.len(),
                "backfilling uncovered positions with the fallback converter"
            );
        }

        let mut reply = reply.into_iter();
        let resolved = self
            .pending
            .iter()
            .map(|pending| {
                reply
                    .next()
                    .or_else(|| fallback_convert(&pending.instruction))
                    .map(|latex| normalize_latex(&latex))
            })
            .collect::<Vec<_>>();

        for (pending, latex) in self.pending.iter().zip(&resolved) {
            if let Some(latex) = latex {
                cache.insert(pending.instruction.clone(), latex.clone());
            }
        }
        self.finish(resolved)
    }

    /// Resolve pending instructions without a provider reply.
    ///
    /// Used after a failed batch: each instruction goes through the fallback
    /// converter, nothing is cached, and unresolvable ones are dropped.
    pub fn degrade(self) -> Reconciled {
        let resolved = self
            .pending
            .iter()
            .map(|pending| fallback_convert(&pending.instruction).map(|latex| normalize_latex(&latex)))
            .collect::<Vec<_>>();
        self.finish(resolved)
    }

    /// Final segments of an already complete plan.
    pub fn into_reconciled(self) -> Reconciled {
        let resolved = vec![None; self.pending.len()];
        self.finish(resolved)
    }

    fn finish(self, resolved: Vec<Option<String>>) -> Reconciled {
        let Self {
            mut segments,
            pending,
        } = self;
        let mut dropped = Vec::new();
        for (pending, latex) in pending.into_iter().zip(resolved) {
            match latex {
                Some(latex) => segments[pending.position] = RenderedSegment::Latex(latex),
                None => dropped.push(pending.instruction),
            }
        }
        if !dropped.is_empty() {
            warn!(count = dropped.len(), "dropping instructions that could not be converted");
        }
        segments.retain(|segment| !segment.is_placeholder());
        Reconciled { segments, dropped }
    }
}
