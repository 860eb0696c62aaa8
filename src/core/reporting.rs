//! Error reporting capability and the capture wrapper used at the RPC boundary.
//!
//! The scheduler does not talk to any error-tracking service itself. It is
//! handed an [`ErrorReporter`] at construction and [`ErrorCapture`] forwards
//! failed calls to it together with the call's context.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::SchedulerError;

/// Key-value context attached to a captured error.
pub type CallContext = BTreeMap<String, String>;

/// Supplies extra per-call context, keyed by operation name.
pub type ContextProvider = Arc<dyn Fn(&str) -> CallContext + Send + Sync>;

/// External error-reporting client.
pub trait ErrorReporter: Send + Sync {
    /// Whether a live client is attached. Disabled reporters are never called.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Report an error with contextual key-values.
    fn capture_exception(&self, error: &SchedulerError, extra: &CallContext);

    /// Drop any per-call context the client accumulated.
    fn clear_context(&self);
}

/// Reporter that writes captured errors to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture_exception(&self, error: &SchedulerError, extra: &CallContext) {
        tracing::error!(kind = ?error.kind(), context = ?extra, "captured error: {}", error);
    }

    fn clear_context(&self) {}
}

/// Clears reporter context when the call scope ends, including on panic.
struct ContextScope<'a> {
    reporter: &'a dyn ErrorReporter,
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.reporter.clear_context();
    }
}

/// Wraps RPC handlers: runs the call, reports failures, clears context.
#[derive(Clone)]
pub struct ErrorCapture {
    reporter: Arc<dyn ErrorReporter>,
    enabled: bool,
    context_provider: Option<ContextProvider>,
}

impl ErrorCapture {
    /// Create a capture wrapper.
    pub fn new(reporter: Arc<dyn ErrorReporter>, enabled: bool) -> Self {
        Self {
            reporter,
            enabled,
            context_provider: None,
        }
    }

    /// Capture wrapper that never reports.
    pub fn disabled() -> Self {
        Self::new(Arc::new(TracingReporter), false)
    }

    /// Attach a provider of extra context values.
    #[must_use]
    pub fn with_context_provider(mut self, provider: ContextProvider) -> Self {
        self.context_provider = Some(provider);
        self
    }

    /// Run `call`; on a scheduler-side failure, report it with `context`
    /// merged with the provider's values. The error is returned unchanged.
    pub fn run<T>(
        &self,
        operation: &str,
        mut context: CallContext,
        call: impl FnOnce() -> Result<T, SchedulerError>,
    ) -> Result<T, SchedulerError> {
        let _scope = ContextScope {
            reporter: self.reporter.as_ref(),
        };
        let result = call();
        if let Err(error) = &result {
            if self.enabled && self.reporter.is_enabled() && !error.is_caller_error() {
                context.insert("operation".into(), operation.to_string());
                if let Some(provider) = &self.context_provider {
                    context.extend(provider(operation));
                }
                self.reporter.capture_exception(error, &context);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        captured: Mutex<Vec<(String, CallContext)>>,
        clears: Mutex<usize>,
    }

    impl ErrorReporter for Recording {
        fn capture_exception(&self, error: &SchedulerError, extra: &CallContext) {
            self.captured.lock().push((error.to_string(), extra.clone()));
        }

        fn clear_context(&self) {
            *self.clears.lock() += 1;
        }
    }

    fn context(task: &str) -> CallContext {
        CallContext::from([("task_id".to_string(), task.to_string())])
    }

    #[test]
    fn reports_scheduler_errors_with_context() {
        let reporter = Arc::new(Recording::default());
        let provider: ContextProvider =
            Arc::new(|_| CallContext::from([("host".to_string(), "sched-1".to_string())]));
        let capture = ErrorCapture::new(reporter.clone(), true).with_context_provider(provider);

        let result: Result<(), _> = capture.run("report_done", context("a"), || {
            Err(SchedulerError::NotServing)
        });

        assert!(result.is_err());
        let captured = reporter.captured.lock();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].1["task_id"], "a");
        assert_eq!(captured[0].1["operation"], "report_done");
        assert_eq!(captured[0].1["host"], "sched-1");
        assert_eq!(*reporter.clears.lock(), 1);
    }

    #[test]
    fn caller_errors_are_not_reported_but_context_is_cleared() {
        let reporter = Arc::new(Recording::default());
        let capture = ErrorCapture::new(reporter.clone(), true);

        let _ = capture.run::<()>("register", context("a"), || {
            Err(SchedulerError::Validation("bad".into()))
        });
        let ok = capture.run("register", context("a"), || Ok(5));

        assert_eq!(ok.unwrap(), 5);
        assert!(reporter.captured.lock().is_empty());
        assert_eq!(*reporter.clears.lock(), 2);
    }

    #[test]
    fn disabled_capture_never_reports() {
        let reporter = Arc::new(Recording::default());
        let capture = ErrorCapture::new(reporter.clone(), false);
        let _ = capture.run::<()>("checkpoint", CallContext::new(), || {
            Err(SchedulerError::CorruptState("x".into()))
        });
        assert!(reporter.captured.lock().is_empty());
    }
}
