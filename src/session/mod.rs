//! Editing session state and loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: the complete session state, conversion cache included
//! - [`Message`]: edits, debounce expiry and provider results
//! - [`update`]: pure state transitions; stale results are dropped here
//! - [`Session::run_watch`]: file watching, debouncing and the worker thread

mod effects;
mod event_loop;
mod model;
mod update;

pub use event_loop::EditDebouncer;
pub use model::{Dispatch, Model, Status};
pub use update::{Message, update};

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::DEFAULT_DEBOUNCE_MS;
use crate::convert::Provider;
use crate::export::CompilerChain;

/// Where and how to export after each settled conversion.
pub struct ExportTarget {
    pub path: PathBuf,
    pub compilers: CompilerChain,
}

/// Owns the provider and output settings for one document.
pub struct Session {
    file_path: PathBuf,
    provider: Provider,
    debounce_ms: u64,
    json_output: bool,
    export: Option<ExportTarget>,
}

impl Session {
    /// Create a session for the given file, converting offline.
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            provider: Provider::Fallback,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            json_output: false,
            export: None,
        }
    }

    /// Use `provider` for batches.
    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Set the quiet period after an edit.
    #[must_use]
    pub const fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    /// Print `{ "segments": [...] }` instead of the plain preview.
    #[must_use]
    pub const fn with_json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }

    /// Export a PDF after every settled conversion.
    #[must_use]
    pub fn with_export(mut self, export: Option<ExportTarget>) -> Self {
        self.export = export;
        self
    }

    fn read_source(&self) -> Result<String> {
        std::fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read {}", self.file_path.display()))
    }
}

#[cfg(test)]
mod tests;
