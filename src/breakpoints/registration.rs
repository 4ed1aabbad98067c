//! Auto-registration of capture call sites.
//!
//! The first capture at a (function, label) pair announces the location to
//! the control plane so a breakpoint can be created for it. The pair is
//! marked before the request is sent, so each location is registered at
//! most once per process whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::definition::LabelKey;
use super::poller::BreakpointPoller;
use crate::telemetry::AgentStats;
use crate::transport::ControlPlane;

/// Registration request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub service_name: String,
    pub file_path: String,
    pub line_number: u32,
    pub function_name: Option<String>,
    pub label: String,
}

/// Locations already attempted. Only grows.
#[derive(Debug, Default)]
pub struct RegistrationSet {
    attempted: DashSet<LabelKey>,
}

impl RegistrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as attempted. Returns true only for the first caller.
    pub fn mark(&self, key: LabelKey) -> bool {
        self.attempted.insert(key)
    }

    pub fn contains(&self, key: &LabelKey) -> bool {
        self.attempted.contains(key)
    }

    pub fn len(&self) -> usize {
        self.attempted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempted.is_empty()
    }
}

/// Fires registration requests in the background.
pub struct AutoRegistrar {
    attempted: RegistrationSet,
    control_plane: Arc<dyn ControlPlane>,
    poller: Arc<BreakpointPoller>,
    service_name: String,
    followup_delay: Duration,
    runtime: Handle,
    stats: Arc<AgentStats>,
}

impl AutoRegistrar {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        poller: Arc<BreakpointPoller>,
        service_name: &str,
        followup_delay: Duration,
        runtime: Handle,
        stats: Arc<AgentStats>,
    ) -> Self {
        Self {
            attempted: RegistrationSet::new(),
            control_plane,
            poller,
            service_name: service_name.to_string(),
            followup_delay,
            runtime,
            stats,
        }
    }

    /// Register the location behind `key` unless already attempted.
    ///
    /// Never blocks: the request and any follow-up poll run on the agent's
    /// runtime. Returns whether a request was dispatched.
    pub fn ensure_registered(&self, key: &LabelKey, file_path: &str, line_number: u32) -> bool {
        if self.attempted.contains(key) || !self.attempted.mark(key.clone()) {
            return false;
        }

        let registration = Registration {
            service_name: self.service_name.clone(),
            file_path: file_path.to_string(),
            line_number,
            function_name: (!key.function_name.is_empty()).then(|| key.function_name.clone()),
            label: key.label.clone(),
        };
        let control_plane = self.control_plane.clone();
        let poller = self.poller.clone();
        let stats = self.stats.clone();
        let delay = self.followup_delay;

        self.runtime.spawn(async move {
            match control_plane.register_location(&registration).await {
                Ok(()) => {
                    stats.record_registration(true);
                    debug!(
                        label = %registration.label,
                        file = %registration.file_path,
                        line = registration.line_number,
                        "code location registered"
                    );
                    tokio::time::sleep(delay).await;
                    let _ = poller.poll_once().await;
                }
                Err(e) => {
                    stats.record_registration(false);
                    warn!(error = %e, label = %registration.label, "code location registration failed");
                }
            }
        });
        true
    }

    pub fn attempted(&self) -> &RegistrationSet {
        &self.attempted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::BreakpointCache;
    use crate::transport::InMemoryControlPlane;

    fn registrar(cp: Arc<InMemoryControlPlane>) -> AutoRegistrar {
        let stats = Arc::new(AgentStats::new());
        let cache = Arc::new(BreakpointCache::new());
        let poller = Arc::new(BreakpointPoller::new(cp.clone(), cache, "svc", stats.clone()));
        AutoRegistrar::new(cp, poller, "svc", Duration::from_secs(1), Handle::current(), stats)
    }

    #[test]
    fn test_set_marks_once() {
        let set = RegistrationSet::new();
        let key = LabelKey::new(Some("f"), "l");
        assert!(set.mark(key.clone()));
        assert!(!set.mark(key.clone()));
        assert!(set.contains(&key));
        assert_eq!(set.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registers_once_per_location() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let reg = registrar(cp.clone());
        let key = LabelKey::new(Some("checkout"), "charge");

        assert!(reg.ensure_registered(&key, "src/a.rs", 10));
        for _ in 0..10 {
            assert!(!reg.ensure_registered(&key, "src/a.rs", 10));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        let sent = cp.registrations();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].function_name.as_deref(), Some("checkout"));
        assert_eq!(sent[0].label, "charge");
        assert_eq!(sent[0].service_name, "svc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_registration_triggers_followup_poll() {
        let cp = Arc::new(InMemoryControlPlane::new());
        let reg = registrar(cp.clone());
        reg.ensure_registered(&LabelKey::new(None, "l"), "src/a.rs", 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cp.fetch_count(), 0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cp.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_registration_is_not_retried() {
        let cp = Arc::new(InMemoryControlPlane::new());
        cp.set_failing(true);
        let reg = registrar(cp.clone());
        let key = LabelKey::new(Some("f"), "l");

        reg.ensure_registered(&key, "src/a.rs", 1);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!reg.ensure_registered(&key, "src/a.rs", 1));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(cp.registrations().len(), 1);
        assert_eq!(cp.fetch_count(), 0);
        assert!(reg.attempted().contains(&key));
    }
}
