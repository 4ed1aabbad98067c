//! Trace correlation supplied by the host's tracing instrumentation.

use serde::{Deserialize, Serialize};

/// Identifiers of the trace active at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
        }
    }
}

/// Source of the current trace context, if any.
///
/// Any `Fn() -> Option<TraceContext>` closure is a provider.
pub trait TraceContextProvider: Send + Sync {
    fn current(&self) -> Option<TraceContext>;
}

impl<F> TraceContextProvider for F
where
    F: Fn() -> Option<TraceContext> + Send + Sync,
{
    fn current(&self) -> Option<TraceContext> {
        self()
    }
}

/// Provider for hosts without distributed tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTraceContext;

impl TraceContextProvider for NoTraceContext {
    fn current(&self) -> Option<TraceContext> {
        None
    }
}
