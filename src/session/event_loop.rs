use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::session::{Message, Model, Session, update};
use crate::watcher::FileWatcher;

/// Holds the latest edit until the document has been quiet for `delay_ms`.
///
/// Time is passed in by the caller, so behavior is deterministic in tests.
pub struct EditDebouncer {
    delay_ms: u64,
    pending_since: Option<u64>,
}

impl EditDebouncer {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending_since: None,
        }
    }

    /// Record an edit; a newer edit restarts the quiet period.
    pub const fn queue(&mut self, now_ms: u64) {
        self.pending_since = Some(now_ms);
    }

    /// True once, when the quiet period since the last edit has passed.
    pub fn take_ready(&mut self, now_ms: u64) -> bool {
        let Some(queued_at) = self.pending_since else {
            return false;
        };
        if now_ms.saturating_sub(queued_at) >= self.delay_ms {
            self.pending_since = None;
            true
        } else {
            false
        }
    }

    pub const fn cancel(&mut self) {
        self.pending_since = None;
    }

    pub const fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }
}

impl Session {
    /// Convert the file once, emit the result, and return the final model.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the output cannot be
    /// written or exported.
    pub fn run_once(&self) -> Result<Model> {
        let source = self.read_source()?;
        let (tx, rx) = mpsc::channel();
        let mut model = update(Model::new(), Message::Edit(source));
        model = self.step(model, Message::Reconcile, &tx);
        while !model.is_settled() {
            let msg = rx
                .recv()
                .context("conversion worker exited without reporting")?;
            model = self.step(model, msg, &tx);
        }
        self.emit(&model)?;
        Ok(model)
    }

    /// Watch the file and re-convert after every quiet period.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be created, the file cannot
    /// be read, or output cannot be written. Export failures are reported
    /// and do not end the session.
    pub fn run_watch(&self) -> Result<()> {
        let _run_scope = crate::perf::scope("session.watch.total");
        let mut watcher = FileWatcher::new(&self.file_path, Duration::from_millis(50))
            .with_context(|| format!("Failed to watch {}", self.file_path.display()))?;
        tracing::info!(path = %watcher.target_path().display(), "watching for edits");
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        let mut debouncer = EditDebouncer::new(self.debounce_ms);

        let mut model = update(Model::new(), Message::Edit(self.read_source()?));
        model = self.step(model, Message::Reconcile, &tx);
        let mut emitted_generation = None;

        loop {
            let now_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            if watcher.take_change_ready() {
                match self.read_source() {
                    Ok(source) => {
                        let before = model.generation;
                        model = self.step(model, Message::Edit(source), &tx);
                        if model.generation != before {
                            debouncer.queue(now_ms);
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "reload failed"),
                }
            }

            if debouncer.take_ready(now_ms) {
                model = self.step(model, Message::Reconcile, &tx);
            }

            model = self.drain(model, &rx, &tx);

            if model.is_settled() && emitted_generation != Some(model.generation) {
                self.emit_watched(&model)?;
                emitted_generation = Some(model.generation);
            }

            if model.should_quit {
                break;
            }

            let poll_ms = if debouncer.is_pending() { 10 } else { 100 };
            std::thread::sleep(Duration::from_millis(poll_ms));
        }
        Ok(())
    }

    /// Apply queued worker results without blocking.
    fn drain(&self, mut model: Model, rx: &Receiver<Message>, tx: &Sender<Message>) -> Model {
        while let Ok(msg) = rx.try_recv() {
            model = self.step(model, msg, tx);
        }
        model
    }

    /// One update followed by its side effects.
    pub(super) fn step(&self, model: Model, msg: Message, tx: &Sender<Message>) -> Model {
        crate::perf::log_event("session.message", format!("{msg:?}"));
        let mut model = update(model, msg);
        self.handle_side_effects(&mut model, tx);
        model
    }
}
