//! Instruction to LaTeX conversion.
//!
//! This module handles:
//! - The session conversion cache
//! - Batch planning and merging ([`plan`], [`Reconciliation`])
//! - The remote provider and the local fallback converter
//! - Normalization of provider output

mod cache;
mod fallback;
mod normalize;
mod reconcile;
mod service;

pub use cache::ConversionCache;
pub use fallback::fallback_convert;
pub use normalize::{KNOWN_COMMANDS, normalize_latex};
pub use reconcile::{Reconciled, Reconciliation, plan};
pub use service::{
    DEFAULT_MODEL, LatexService, Provider, RemoteService, ServiceConfig, parse_latex_list,
};

use tracing::warn;

use crate::document::extract;
use crate::error::Error;

/// Reconcile `source` in one blocking pass.
///
/// Cache hits never reach the provider, and a fully cached document makes
/// no call at all.
///
/// # Errors
/// Returns [`Error::ConversionUnavailable`] when the batch call fails. The
/// cache is left untouched in that case.
pub fn reconcile(
    source: &str,
    cache: &mut ConversionCache,
    provider: &Provider,
) -> Result<Reconciled, Error> {
    let _scope = crate::perf::scope("convert.reconcile");
    let plan = plan(extract(source), cache);
    if plan.is_complete() {
        return Ok(plan.into_reconciled());
    }
    let batch = plan.batch();
    crate::perf::log_event(
        "convert.batch",
        format!("provider={} count={}", provider.name(), batch.len()),
    );
    let reply = provider.request(&batch)?;
    Ok(plan.merge(reply, cache))
}

/// Like [`reconcile`], but a failed batch degrades to the fallback converter.
///
/// Instructions the fallback cannot convert are dropped from the output.
pub fn reconcile_or_degrade(
    source: &str,
    cache: &mut ConversionCache,
    provider: &Provider,
) -> Reconciled {
    match reconcile(source, cache, provider) {
        Ok(reconciled) => reconciled,
        Err(err) => {
            warn!(error = %err, "conversion failed, degrading to fallback converter");
            crate::perf::log_event("convert.degrade", err.to_string());
            plan(extract(source), cache).degrade()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RenderedSegment;
    use crate::error::ServiceError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingService {
        calls: AtomicUsize,
        fail: bool,
    }

    impl LatexService for CountingService {
        fn name(&self) -> &str {
            "counting"
        }

        fn convert_batch(&self, instructions: &[String]) -> Result<Vec<String>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServiceError::Timeout);
            }
            Ok(instructions.iter().map(|i| format!("[{i}]")).collect())
        }
    }

    fn counting(fail: bool) -> (Arc<CountingService>, Provider) {
        let service = Arc::new(CountingService {
            calls: AtomicUsize::new(0),
            fail,
        });
        (service.clone(), Provider::Remote(service))
    }

    #[test]
    fn test_offline_scenario() {
        let mut cache = ConversionCache::new();
        let result = reconcile("*squareroot(2x)* is steep", &mut cache, &Provider::Fallback).unwrap();
        assert_eq!(
            result.segments,
            vec![
                RenderedSegment::Latex("\\sqrt{2x}".to_string()),
                RenderedSegment::Text("is steep".to_string()),
            ]
        );
    }

    #[test]
    fn test_cached_document_makes_no_call() {
        let (service, provider) = counting(false);
        let mut cache = ConversionCache::new();
        let first = reconcile("*a* and *b*", &mut cache, &provider).unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        let second = reconcile("*a* and *b*", &mut cache, &provider).unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_makes_no_call() {
        let (service, provider) = counting(false);
        let mut cache = ConversionCache::new();
        let result = reconcile("", &mut cache, &provider).unwrap();
        assert!(result.segments.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_batch_keeps_cache() {
        let mut cache = ConversionCache::new();
        cache.insert("a", "A");
        let (_, provider) = counting(true);
        let err = reconcile("*a* *b*", &mut cache, &provider).unwrap_err();
        assert!(matches!(err, Error::ConversionUnavailable(_)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some("A"));
    }

    #[test]
    fn test_degrade_after_failure() {
        let mut cache = ConversionCache::new();
        let (_, provider) = counting(true);
        let result = reconcile_or_degrade("*fraction(1,2)* of *the pie*", &mut cache, &provider);
        assert_eq!(
            result.segments,
            vec![
                RenderedSegment::Latex("\\frac{1}{2}".to_string()),
                RenderedSegment::Text("of".to_string()),
            ]
        );
        assert_eq!(result.dropped, vec!["the pie"]);
        assert!(cache.is_empty());
    }
}
