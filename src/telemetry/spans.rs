//! Span helpers for the agent's background operations.

use tracing::{debug_span, Span};

/// Extension trait for recording an operation's outcome on a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the spans wrapping control-plane calls.
///
/// These are debug-level so a host running at `info` pays nothing for them.
pub struct AgentSpan;

impl AgentSpan {
    /// Span for one metrics export; `points` is the batch size.
    pub fn export(service: &str, points: usize) -> Span {
        debug_span!(
            "codewatch.export",
            service = %service,
            points,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }

    /// Span for one breakpoint poll.
    pub fn poll(service: &str) -> Span {
        debug_span!(
            "codewatch.poll",
            service = %service,
            breakpoints = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }

    /// Span for one snapshot submission.
    pub fn submit(breakpoint_id: &str) -> Span {
        debug_span!(
            "codewatch.submit",
            breakpoint_id = %breakpoint_id,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
