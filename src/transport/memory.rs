//! In-process control plane that records every call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ControlPlane, TransportError};
use crate::breakpoints::{BreakpointDefinition, Registration};
use crate::capture::Snapshot;
use crate::metrics::MetricsPayload;

/// Control plane held in memory.
///
/// Serves a configurable breakpoint list and keeps everything it receives.
/// Can be switched into a failing mode to exercise the agent's
/// drop-on-failure paths.
#[derive(Default)]
pub struct InMemoryControlPlane {
    breakpoints: Mutex<Vec<BreakpointDefinition>>,
    exports: Mutex<Vec<MetricsPayload>>,
    registrations: Mutex<Vec<Registration>>,
    snapshots: Mutex<Vec<Snapshot>>,
    fetch_delays: Mutex<VecDeque<Duration>>,
    fetches: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list served to the next poll.
    pub fn set_breakpoints(&self, breakpoints: Vec<BreakpointDefinition>) {
        *self.breakpoints.lock() = breakpoints;
    }

    /// Delay the response of the next not-yet-started fetch by `delay`.
    /// The list it returns is the one set when the fetch began.
    pub fn queue_fetch_delay(&self, delay: Duration) {
        self.fetch_delays.lock().push_back(delay);
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn exports(&self) -> Vec<MetricsPayload> {
        self.exports.lock().clone()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.lock().clone()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of metric data points received across all exports.
    pub fn exported_point_count(&self) -> usize {
        self.exports.lock().iter().map(MetricsPayload::point_count).sum()
    }

    fn check_available(&self) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("in-memory control plane failing".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn export_metrics(&self, payload: &MetricsPayload) -> Result<(), TransportError> {
        self.check_available()?;
        self.exports.lock().push(payload.clone());
        Ok(())
    }

    async fn fetch_active_breakpoints(
        &self,
        _service_name: &str,
    ) -> Result<Vec<BreakpointDefinition>, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let breakpoints = self.breakpoints.lock().clone();
        let delay = self.fetch_delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(breakpoints)
    }

    async fn register_location(&self, registration: &Registration) -> Result<(), TransportError> {
        self.registrations.lock().push(registration.clone());
        self.check_available()
    }

    async fn submit_snapshot(&self, snapshot: &Snapshot) -> Result<(), TransportError> {
        self.check_available()?;
        self.snapshots.lock().push(snapshot.clone());
        Ok(())
    }
}
