// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. convert::ConversionCache)
    clippy::module_name_repetitions
)]

//! # Mathscribe
//!
//! Live conversion of natural-language math to LaTeX.
//!
//! Text between `*` delimiters is an instruction such as
//! `*squareroot(2x)*` or `*integral of x squared from 0 to 1*`. Mathscribe
//! extracts those instructions, converts them to LaTeX through a remote
//! language-model service (or a local pattern converter when offline),
//! and caches every answer for the rest of the session.
//!
//! ## Architecture
//!
//! The editing session uses The Elm Architecture (TEA) pattern:
//! - **Model**: document text, generation counter and conversion cache
//! - **Message**: edits, debounce expiry and provider results
//! - **Update**: pure state transitions; stale results are dropped
//! - **Effects**: worker threads for provider calls, output and export
//!
//! ## Modules
//!
//! - [`document`]: Instruction extraction and segment types
//! - [`convert`]: Cache, batch reconciliation, providers and fallback
//! - [`session`]: Debounced editing loop
//! - [`api`]: JSON request interface
//! - [`export`]: LaTeX document assembly and PDF compilation
//! - [`watcher`]: File watching
//! - [`config`]: Layered flag defaults

pub mod api;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod export;
pub mod perf;
pub mod session;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::convert::{ConversionCache, Provider, reconcile};
    pub use crate::document::{RenderedSegment, Segment, extract};
    pub use crate::error::Error;
    pub use crate::session::{Message, Model, Session};
}
