//! Detects saves of the document being edited.
//!
//! The parent directory is watched rather than the file itself: many
//! editors save by writing a temporary file and renaming it over the
//! original, which some backends only report at directory level.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches one document and reports settled changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    target: WatchTarget,
    settle: Duration,
    changed_at: Option<Instant>,
}

#[derive(Debug, Clone)]
struct WatchTarget {
    root: PathBuf,
    path: PathBuf,
    name: Option<OsString>,
}

impl WatchTarget {
    fn new(path: &Path) -> Self {
        // OS events carry canonical paths.
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = path.file_name().map(std::ffi::OsStr::to_os_string);
        Self { root, path, name }
    }

    fn is_touched_by(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.root
                || path == &self.path
                || self
                    .name
                    .as_ref()
                    .is_some_and(|name| path.file_name() == Some(name.as_os_str()))
        })
    }
}

impl FileWatcher {
    /// Watch `path`; a change is reported once no further events arrive
    /// for `settle`.
    ///
    /// # Errors
    /// Returns an error if the platform watcher cannot be created or the
    /// directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, settle: Duration) -> notify::Result<Self> {
        let target = WatchTarget::new(path.as_ref());
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&target.root, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %target.path.display(), "watching document");

        Ok(Self {
            _watcher: watcher,
            rx,
            target,
            settle,
            changed_at: None,
        })
    }

    /// Canonical path of the watched document.
    pub fn target_path(&self) -> &Path {
        &self.target.path
    }

    /// True once per burst of changes, after the burst has settled.
    pub fn take_change_ready(&mut self) -> bool {
        let mut relevant = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.target.is_touched_by(&ev) => relevant += 1,
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "watch error"),
            }
        }
        if relevant > 0 {
            crate::perf::log_event("watcher.change", format!("events={relevant}"));
            self.changed_at = Some(Instant::now());
        }

        match self.changed_at {
            Some(at) if at.elapsed() >= self.settle => {
                self.changed_at = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use tempfile::tempdir;

    fn event_for(path: PathBuf) -> Event {
        Event {
            kind: EventKind::Any,
            paths: vec![path],
            attrs: notify::event::EventAttributes::new(),
        }
    }

    #[test]
    fn test_directory_event_counts_for_document() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("notes.txt");
        std::fs::write(&path, "*squareroot(2)*").expect("write");

        let target = WatchTarget::new(&path);
        assert!(target.is_touched_by(&event_for(canonical_dir)));
    }

    #[test]
    fn test_sibling_file_is_ignored() {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join("notes.txt");
        std::fs::write(&path, "x").expect("write");

        let target = WatchTarget::new(&path);
        assert!(!target.is_touched_by(&event_for(canonical_dir.join("other.txt"))));
    }

    #[test]
    fn test_relative_file_watches_current_directory() {
        let target = WatchTarget::new(Path::new("mathscribe-missing-notes.txt"));
        assert_eq!(target.root, PathBuf::from("."));
    }

    #[test]
    fn test_save_is_reported_after_settling() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().canonicalize().expect("canonicalize").join("notes.txt");
        std::fs::write(&path, "before").expect("write");

        let mut watcher = FileWatcher::new(&path, Duration::from_millis(50)).expect("watcher");
        std::thread::sleep(Duration::from_millis(500));
        std::fs::write(&path, "after *fraction(1,2)*").expect("write");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut detected = false;
        while Instant::now() < deadline {
            if watcher.take_change_ready() {
                detected = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(detected, "save should be reported within 5 seconds");
    }
}
