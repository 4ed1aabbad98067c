//! Periodic refresh of the breakpoint cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::cache::BreakpointCache;
use crate::telemetry::{AgentSpan, AgentStats, SpanExt};
use crate::transport::{ControlPlane, TransportError};

/// Fetches the active breakpoint list and swaps it into the cache.
pub struct BreakpointPoller {
    control_plane: Arc<dyn ControlPlane>,
    cache: Arc<BreakpointCache>,
    service_name: String,
    stats: Arc<AgentStats>,
    /// One poll at a time, so a slow response never replaces a newer one.
    poll_gate: Mutex<()>,
}

impl BreakpointPoller {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        cache: Arc<BreakpointCache>,
        service_name: &str,
        stats: Arc<AgentStats>,
    ) -> Self {
        Self {
            control_plane,
            cache,
            service_name: service_name.to_string(),
            stats,
            poll_gate: Mutex::new(()),
        }
    }

    /// Poll once. On success the cache is fully replaced and the number of
    /// definitions returned; on failure the cache is left as it was.
    pub async fn poll_once(&self) -> Result<usize, TransportError> {
        let _gate = self.poll_gate.lock().await;
        let span = AgentSpan::poll(&self.service_name);
        let result = self
            .control_plane
            .fetch_active_breakpoints(&self.service_name)
            .instrument(span.clone())
            .await;
        span.record_result(&result);

        match result {
            Ok(definitions) => {
                let count = definitions.len();
                span.record("breakpoints", count as u64);
                self.cache.replace(definitions);
                self.stats.record_poll(true);
                debug!(breakpoints = count, "breakpoint cache refreshed");
                Ok(count)
            }
            Err(e) => {
                self.stats.record_poll(false);
                warn!(error = %e, "breakpoint poll failed, keeping previous cache");
                Err(e)
            }
        }
    }

    /// Poll immediately, then every `interval` until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        info!(
            interval_secs = interval.as_secs(),
            service = %self.service_name,
            "breakpoint poller started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("breakpoint poller stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let _ = self.poll_once().await;
                }
            }
        }
    }
}
