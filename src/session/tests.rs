use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use tempfile::tempdir;

use crate::convert::{ConversionCache, LatexService, Provider};
use crate::document::RenderedSegment;
use crate::error::{Error, ServiceError};
use crate::export::{Compiler, CompilerChain};

use super::event_loop::EditDebouncer;
use super::{ExportTarget, Message, Model, Session, Status, update};

fn latex(s: &str) -> RenderedSegment {
    RenderedSegment::Latex(s.to_string())
}

fn text(s: &str) -> RenderedSegment {
    RenderedSegment::Text(s.to_string())
}

fn edited(source: &str) -> Model {
    update(Model::new(), Message::Edit(source.to_string()))
}

fn finished(generation: u64, reply: &[&str]) -> Message {
    Message::BatchFinished {
        generation,
        outcome: Ok(reply.iter().map(ToString::to_string).collect()),
    }
}

struct EchoService {
    calls: AtomicUsize,
}

impl LatexService for EchoService {
    fn name(&self) -> &str {
        "echo"
    }

    fn convert_batch(&self, instructions: &[String]) -> Result<Vec<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(instructions.iter().map(|i| format!("<{i}>")).collect())
    }
}

/// A TeX engine that always rejects the document.
struct BrokenEngine;

impl Compiler for BrokenEngine {
    fn name(&self) -> &str {
        "broken"
    }

    fn compile(&self, _markup: &str, _output_name: &str) -> Result<Vec<u8>, Error> {
        Err(Error::CompilationFailed {
            backend: "broken".to_string(),
            message: "engine exited with exit status: 1".to_string(),
            log_tail: "! Undefined control sequence.".to_string(),
        })
    }
}

fn broken_export(path: PathBuf) -> Option<ExportTarget> {
    Some(ExportTarget {
        path,
        compilers: CompilerChain::new().with(BrokenEngine),
    })
}

#[test]
fn test_edit_bumps_generation_and_waits() {
    let model = edited("*a* b");
    assert_eq!(model.generation, 1);
    assert_eq!(model.status, Status::Waiting);
    assert!(model.rendered.is_empty());
}

#[test]
fn test_identical_edit_is_ignored() {
    let model = edited("*a* b");
    let model = update(model, Message::Edit("*a* b".to_string()));
    assert_eq!(model.generation, 1);
}

#[test]
fn test_reconcile_shows_placeholders_and_dispatches_once() {
    let mut model = update(edited("*a* b"), Message::Reconcile);
    assert_eq!(model.status, Status::Converting { generation: 1 });
    assert_eq!(
        model.rendered,
        vec![RenderedSegment::Placeholder("a".to_string()), text("b")]
    );

    let dispatch = model.take_dispatch().expect("batch pending");
    assert_eq!(dispatch.generation, 1);
    assert_eq!(dispatch.batch, vec!["a"]);
    assert!(model.take_dispatch().is_none());
    assert_eq!(model.batches_dispatched, 1);
}

#[test]
fn test_second_reconcile_does_not_plan_another_batch() {
    let mut model = update(edited("*a*"), Message::Reconcile);
    let _ = model.take_dispatch();
    let mut model = update(model, Message::Reconcile);
    assert!(model.take_dispatch().is_none());
}

#[test]
fn test_batch_result_merges_and_caches() {
    let model = update(edited("*a* b"), Message::Reconcile);
    let model = update(model, finished(1, &["\\alpha"]));
    assert_eq!(model.status, Status::Ready);
    assert_eq!(model.rendered, vec![latex("\\alpha"), text("b")]);
    assert_eq!(model.cache.get("a"), Some("\\alpha"));
    assert_eq!(model.in_flight_generation(), None);
}

#[test]
fn test_stale_result_is_discarded() {
    let model = update(edited("*a*"), Message::Reconcile);
    let model = update(model, Message::Edit("*b*".to_string()));
    let model = update(model, Message::Reconcile);
    assert_eq!(model.generation, 2);

    // The generation 1 answer arrives late.
    let model = update(model, finished(1, &["A"]));
    assert_eq!(model.status, Status::Converting { generation: 2 });
    assert!(model.cache.is_empty());
    assert_eq!(model.rendered, vec![RenderedSegment::Placeholder("b".to_string())]);

    let model = update(model, finished(2, &["B"]));
    assert_eq!(model.rendered, vec![latex("B")]);
    assert!(!model.cache.contains("a"));
}

#[test]
fn test_result_after_edit_without_reconcile_is_discarded() {
    let model = update(edited("*a*"), Message::Reconcile);
    let model = update(model, Message::Edit("*a* more".to_string()));
    let model = update(model, finished(1, &["A"]));
    assert_eq!(model.status, Status::Waiting);
    assert!(model.cache.is_empty());
}

#[test]
fn test_failed_batch_keeps_cache_and_degrades() {
    let mut cache = ConversionCache::new();
    cache.insert("known", "K");
    let model = Model::new().with_cache(cache);
    let model = update(model, Message::Edit("*known* *squareroot(2)* *golden ratio*".to_string()));
    let model = update(model, Message::Reconcile);
    let model = update(
        model,
        Message::BatchFinished {
            generation: 1,
            outcome: Err(ServiceError::Timeout),
        },
    );

    assert!(matches!(model.status, Status::Failed(_)));
    assert_eq!(model.rendered, vec![latex("K"), latex("\\sqrt{2}")]);
    assert_eq!(model.dropped, vec!["golden ratio"]);
    assert_eq!(model.cache.len(), 1);
    assert_eq!(model.cache.get("known"), Some("K"));
}

#[test]
fn test_fully_cached_document_settles_without_dispatch() {
    let model = update(edited("*a* b"), Message::Reconcile);
    let model = update(model, finished(1, &["A"]));

    let model = update(model, Message::Edit("b *a*".to_string()));
    let mut model = update(model, Message::Reconcile);
    assert_eq!(model.status, Status::Ready);
    assert_eq!(model.rendered, vec![text("b"), latex("A")]);
    assert!(model.take_dispatch().is_none());
    assert_eq!(model.batches_dispatched, 0);
}

#[test]
fn test_duplicate_instructions_collapse_on_next_cycle() {
    let source = "*fraction(1,2)* and again *fraction(1,2)*";
    let mut model = update(edited(source), Message::Reconcile);
    let dispatch = model.take_dispatch().unwrap();
    assert_eq!(dispatch.batch.len(), 2);
    let model = update(model, finished(1, &["\\frac{1}{2}", "\\frac{1}{2}"]));

    let model = update(model, Message::Edit(format!("{source}!")));
    let mut model = update(model, Message::Reconcile);
    assert!(model.take_dispatch().is_none());
    assert_eq!(model.status, Status::Ready);
}

#[test]
fn test_empty_document_settles_immediately() {
    let mut model = update(edited(""), Message::Reconcile);
    assert_eq!(model.status, Status::Ready);
    assert!(model.rendered.is_empty());
    assert!(model.take_dispatch().is_none());
}

#[test]
fn test_quit_sets_flag() {
    let model = update(Model::new(), Message::Quit);
    assert!(model.should_quit);
}

#[test]
fn test_debouncer_waits_for_quiet_period() {
    let mut debouncer = EditDebouncer::new(300);
    assert!(!debouncer.take_ready(0));

    debouncer.queue(100);
    assert!(debouncer.is_pending());
    assert!(!debouncer.take_ready(250));

    // A newer edit restarts the window.
    debouncer.queue(250);
    assert!(!debouncer.take_ready(450));
    assert!(debouncer.take_ready(550));
    assert!(!debouncer.is_pending());
    assert!(!debouncer.take_ready(900));
}

#[test]
fn test_debouncer_cancel() {
    let mut debouncer = EditDebouncer::new(10);
    debouncer.queue(0);
    debouncer.cancel();
    assert!(!debouncer.take_ready(100));
}

#[test]
fn test_step_dispatches_to_worker_and_result_comes_back() {
    let service = Arc::new(EchoService {
        calls: AtomicUsize::new(0),
    });
    let session =
        Session::new(PathBuf::from("notes.txt")).with_provider(Provider::Remote(service.clone()));
    let (tx, rx) = mpsc::channel();

    let model = session.step(Model::new(), Message::Edit("*x* y".to_string()), &tx);
    let model = session.step(model, Message::Reconcile, &tx);
    let msg = rx.recv_timeout(Duration::from_secs(5)).expect("worker reply");
    let model = session.step(model, msg, &tx);

    assert_eq!(model.rendered, vec![latex("<x>"), text("y")]);
    assert_eq!(service.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_run_once_offline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "*squareroot(2x)* is steep").unwrap();

    let model = Session::new(path).run_once().unwrap();
    assert_eq!(model.rendered, vec![latex("\\sqrt{2x}"), text("is steep")]);
    assert_eq!(model.status, Status::Ready);
}

#[test]
fn test_run_once_missing_file_fails() {
    let dir = tempdir().unwrap();
    let result = Session::new(dir.path().join("missing.txt")).run_once();
    assert!(result.is_err());
}

#[test]
fn test_run_once_reports_compiler_diagnostic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "*squareroot(2)*").unwrap();

    let err = Session::new(path)
        .with_export(broken_export(dir.path().join("notes.pdf")))
        .run_once()
        .unwrap_err();
    assert!(format!("{err:?}").contains("Undefined control sequence"));
}

#[test]
fn test_watched_export_failure_keeps_session_alive() {
    let dir = tempdir().unwrap();
    let pdf = dir.path().join("notes.pdf");
    let session = Session::new(dir.path().join("notes.txt")).with_export(broken_export(pdf.clone()));

    let first = update(edited("*squareroot(2)*"), Message::Reconcile);
    let first = update(first, finished(1, &[]));
    assert!(first.is_settled());
    assert!(session.emit_watched(&first).is_ok());

    // The next save is still handled.
    let second = update(first, Message::Edit("*fraction(1,2)*".to_string()));
    let second = update(second, Message::Reconcile);
    let second = update(second, finished(2, &[]));
    assert!(second.is_settled());
    assert!(session.emit_watched(&second).is_ok());
    assert!(!pdf.exists());
}
