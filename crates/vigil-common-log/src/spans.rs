//! Tracing spans used around audited calls.

use tracing::{debug_span, Span};

/// Create the span that wraps one intercepted call.
pub fn audit_span(method: &str, strategy: &str, audited_type: &str) -> Span {
    debug_span!(
        "audit",
        method = %method,
        strategy = %strategy,
        audited_type = %audited_type,
        error = tracing::field::Empty,
    )
}

/// Create a span for a single strategy hook.
pub fn hook_span(hook: &'static str) -> Span {
    debug_span!("audit_hook", hook = hook)
}

/// Record the audited call's error on the current audit span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Timing utility for audited calls.
pub struct Timer {
    start: std::time::Instant,
    operation: String,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation: operation.into(),
        }
    }

    /// Elapsed time so far.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// Complete the timer and record duration.
    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_us = %duration.as_micros(),
            "audited call completed"
        );
    }
}
