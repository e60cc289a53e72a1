use std::collections::HashMap;

/// Session-scoped map from instruction text to resolved LaTeX.
///
/// Keys are the exact instruction text as extracted, whitespace included.
/// Entries are never evicted; the cache lives as long as the editing
/// session that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionCache {
    entries: HashMap<String, String>,
}

impl ConversionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instruction: &str) -> Option<&str> {
        self.entries.get(instruction).map(String::as_str)
    }

    pub fn contains(&self, instruction: &str) -> bool {
        self.entries.contains_key(instruction)
    }

    /// Record a resolution. Later resolutions of the same key replace earlier ones.
    pub fn insert(&mut self, instruction: impl Into<String>, latex: impl Into<String>) {
        self.entries.insert(instruction.into(), latex.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
