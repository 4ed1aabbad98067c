//! The capture call surface used by instrumented code.
//!
//! A capture call never blocks on the network. When no usable breakpoint
//! matches, it returns after one cache lookup and does nothing else. When one
//! does, variables are scanned and redacted on the calling thread, and the
//! snapshot is submitted from a detached task on the agent's runtime.

mod location;
mod snapshot;
mod trace;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::Instrument;

use crate::breakpoints::{AutoRegistrar, BreakpointCache, BreakpointDefinition, LabelKey, LocationKey};
use crate::security::{FlagCategory, SecurityScanner};
use crate::telemetry::{log_security_event, AgentSpan, AgentStats, SecurityEvent, SpanExt};
use crate::transport::ControlPlane;

pub use location::CaptureLocation;
pub use snapshot::Snapshot;
pub use trace::{NoTraceContext, TraceContext, TraceContextProvider};

/// What a capture call decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Code monitoring is switched off for this agent.
    Disabled,
    /// No usable breakpoint matched. Nothing was scanned or sent.
    NoActiveBreakpoint,
    /// A snapshot was built and handed off for submission.
    Submitted { breakpoint_id: String, redacted: usize },
}

/// Decides whether to capture and builds the snapshot.
pub struct SnapshotCapture {
    service_name: String,
    cache: Arc<BreakpointCache>,
    registrar: AutoRegistrar,
    scanner: SecurityScanner,
    trace: Arc<dyn TraceContextProvider>,
    control_plane: Arc<dyn ControlPlane>,
    runtime: Handle,
    stats: Arc<AgentStats>,
}

impl SnapshotCapture {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service_name: &str,
        cache: Arc<BreakpointCache>,
        registrar: AutoRegistrar,
        trace: Arc<dyn TraceContextProvider>,
        control_plane: Arc<dyn ControlPlane>,
        runtime: Handle,
        stats: Arc<AgentStats>,
    ) -> Self {
        Self {
            service_name: service_name.to_string(),
            cache,
            registrar,
            scanner: SecurityScanner::new(),
            trace,
            control_plane,
            runtime,
            stats,
        }
    }

    /// Capture `variables` at `location` if a usable breakpoint matches.
    pub fn capture(
        &self,
        label: &str,
        variables: &BTreeMap<String, Value>,
        location: &CaptureLocation,
    ) -> CaptureOutcome {
        let label_key = LabelKey::new(location.function_name.as_deref(), label);
        self.registrar
            .ensure_registered(&label_key, &location.file_path, location.line_number);

        let location_key = LocationKey::new(&location.file_path, location.line_number);
        let Some(breakpoint) = self.cache.lookup(Some(&label_key), &location_key) else {
            return CaptureOutcome::NoActiveBreakpoint;
        };

        let snapshot = self.build_snapshot(&breakpoint, label, variables, location);
        let redacted = snapshot.security_flags.len();
        let breakpoint_id = snapshot.breakpoint_id.clone();
        self.submit(snapshot);

        CaptureOutcome::Submitted {
            breakpoint_id,
            redacted,
        }
    }

    fn build_snapshot(
        &self,
        breakpoint: &BreakpointDefinition,
        label: &str,
        variables: &BTreeMap<String, Value>,
        location: &CaptureLocation,
    ) -> Snapshot {
        let scan = self.scanner.scan(variables);
        for flag in &scan.flags {
            let event = match flag.category {
                FlagCategory::Pii => SecurityEvent::PiiRedacted,
                FlagCategory::Credential => SecurityEvent::CredentialRedacted,
            };
            log_security_event(
                event,
                "Variable redacted before capture",
                &[
                    ("variable", flag.variable_name.as_str()),
                    ("subtype", flag.subtype.as_str()),
                    ("breakpoint_id", breakpoint.id.as_str()),
                ],
            );
        }
        self.stats.record_redactions(scan.flags.len());

        let trace = self.trace.current();
        Snapshot {
            breakpoint_id: breakpoint.id.clone(),
            service_name: self.service_name.clone(),
            file_path: location.file_path.clone(),
            function_name: location.function_name.clone(),
            label: Some(label.to_string()),
            line_number: location.line_number,
            variables: scan.sanitized,
            security_flags: scan.flags,
            stack_trace: std::backtrace::Backtrace::force_capture().to_string(),
            trace_id: trace.as_ref().map(|t| t.trace_id.clone()),
            span_id: trace.map(|t| t.span_id),
            captured_at: Utc::now(),
        }
    }

    /// Fire-and-forget. The outcome is only logged.
    fn submit(&self, snapshot: Snapshot) {
        let control_plane = self.control_plane.clone();
        let stats = self.stats.clone();
        let span = AgentSpan::submit(&snapshot.breakpoint_id);

        self.runtime.spawn(async move {
            let result = control_plane
                .submit_snapshot(&snapshot)
                .instrument(span.clone())
                .await;
            span.record_result(&result);
            stats.record_submission(result.is_ok());

            match result {
                Ok(()) => log_security_event(
                    SecurityEvent::SnapshotSubmitted,
                    "Snapshot submitted",
                    &[("breakpoint_id", snapshot.breakpoint_id.as_str())],
                ),
                Err(e) => {
                    let error = e.to_string();
                    log_security_event(
                        SecurityEvent::SnapshotDropped,
                        "Snapshot submission failed, dropped",
                        &[
                            ("breakpoint_id", snapshot.breakpoint_id.as_str()),
                            ("error", error.as_str()),
                        ],
                    );
                }
            }
        });
    }
}
