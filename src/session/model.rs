use crate::convert::{ConversionCache, Reconciliation};
use crate::document::RenderedSegment;

/// Where the current document is in its conversion cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Nothing loaded yet.
    Idle,
    /// Edited; waiting for the quiet period to pass.
    Waiting,
    /// A batch for this generation is with the provider.
    Converting { generation: u64 },
    /// Every instruction is resolved (or dropped).
    Ready,
    /// The last batch failed; output is the fallback rendition.
    Failed(String),
}

/// A batch ready to be sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub generation: u64,
    pub batch: Vec<String>,
}

#[derive(Debug, Clone)]
pub(super) struct InFlight {
    pub(super) generation: u64,
    pub(super) plan: Reconciliation,
    pub(super) dispatched: bool,
}

/// The complete session state.
///
/// All state lives here, the conversion cache included; the update
/// function is the only writer.
#[derive(Debug, Clone)]
pub struct Model {
    /// Current document text
    pub source: String,
    /// Bumped on every edit; results for older generations are stale
    pub generation: u64,
    /// Session-scoped instruction to LaTeX cache
    pub cache: ConversionCache,
    /// What should be displayed right now
    pub rendered: Vec<RenderedSegment>,
    /// Instructions dropped from the last completed reconciliation
    pub dropped: Vec<String>,
    pub status: Status,
    /// Number of batches handed to the provider this session
    pub batches_dispatched: u64,
    pub should_quit: bool,
    pub(super) in_flight: Option<InFlight>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            source: String::new(),
            generation: 0,
            cache: ConversionCache::new(),
            rendered: Vec::new(),
            dropped: Vec::new(),
            status: Status::Idle,
            batches_dispatched: 0,
            should_quit: false,
            in_flight: None,
        }
    }

    /// Start from an existing cache, e.g. one carried over from a previous document.
    #[must_use]
    pub fn with_cache(mut self, cache: ConversionCache) -> Self {
        self.cache = cache;
        self
    }

    /// Generation of the batch currently awaiting a result, if any.
    pub fn in_flight_generation(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|in_flight| in_flight.generation)
    }

    /// Hand out the pending batch exactly once.
    pub fn take_dispatch(&mut self) -> Option<Dispatch> {
        let in_flight = self.in_flight.as_mut()?;
        if in_flight.dispatched {
            return None;
        }
        in_flight.dispatched = true;
        self.batches_dispatched += 1;
        Some(Dispatch {
            generation: in_flight.generation,
            batch: in_flight.plan.batch(),
        })
    }

    /// True once the current generation is fully rendered.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, Status::Ready | Status::Failed(_))
    }
}
