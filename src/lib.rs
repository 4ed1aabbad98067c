//! CodeWatch in-process telemetry agent.
//!
//! Embedded in an application, the agent buffers metrics and exports them to
//! the control plane, and captures redacted snapshots of local variables at
//! code locations where the control plane has activated a breakpoint.
//!
//! # Guarantees
//!
//! - **Non-blocking**: metric mutations and capture decisions never wait on
//!   network I/O. Exports, polls, registrations and submissions run on the
//!   agent's runtime.
//! - **Redact before send**: every captured variable passes through the
//!   [`security::SecurityScanner`] before a snapshot is built.
//! - **Best effort**: control-plane failures are logged and dropped. Nothing
//!   is retried and nothing is persisted across restarts.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use codewatch_agent::{capture_location, metrics::tags, Agent, AgentConfig};
//!
//! # async fn run() -> Result<(), codewatch_agent::AgentError> {
//! let agent = Agent::start(AgentConfig::new("cw_live_key", "checkout", "app.codewatch.dev"))?;
//!
//! let orders = agent.counter("orders_total", tags([("region", "eu")]));
//! orders.inc();
//!
//! let vars = BTreeMap::from([("order_id".to_string(), serde_json::json!(42))]);
//! agent.capture("before-charge", &vars, &capture_location!("checkout"));
//!
//! agent.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod breakpoints;
pub mod capture;
pub mod config;
pub mod endpoint;
pub mod metrics;
pub mod security;
pub mod telemetry;
pub mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use breakpoints::{AutoRegistrar, BreakpointCache, BreakpointPoller};
use capture::{CaptureLocation, CaptureOutcome, NoTraceContext, SnapshotCapture, TraceContextProvider};
use metrics::{
    Counter, Gauge, Histogram, Instruments, MetricKind, MetricsExporter, MetricsRegistry,
    RegistryConfig, Tags,
};
use telemetry::{install_agent_logging, AgentStats, AgentStatsSnapshot, LogError};
use transport::{ControlPlane, HttpControlPlane, TransportError};

pub use config::{AgentConfig, ConfigError};

/// Errors that prevent the agent from starting.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Agent must be started from within a Tokio runtime")]
    NoRuntime,

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LogError),
}

/// A running agent. Owns every piece of shared state.
pub struct Agent {
    config: AgentConfig,
    instance_id: String,
    stats: Arc<AgentStats>,
    registry: Arc<MetricsRegistry>,
    instruments: Instruments,
    cache: Arc<BreakpointCache>,
    poller: Arc<BreakpointPoller>,
    capture: SnapshotCapture,
    runtime: Handle,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl Agent {
    /// Start an agent talking HTTP to the configured endpoint.
    pub fn start(config: AgentConfig) -> Result<Self, AgentError> {
        config.validate()?;
        let control_plane = Arc::new(HttpControlPlane::new(&config)?);
        Self::start_with(config, control_plane, Arc::new(NoTraceContext))
    }

    /// Start an agent with an explicit control plane and trace source.
    ///
    /// Must be called from within a Tokio runtime; background work is spawned
    /// onto it. Installs the agent's log subscriber per `config.log` unless
    /// the host already set one.
    pub fn start_with(
        config: AgentConfig,
        control_plane: Arc<dyn ControlPlane>,
        trace: Arc<dyn TraceContextProvider>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| AgentError::NoRuntime)?;
        let logging = install_agent_logging(&config.log)?;

        let instance_id = uuid::Uuid::new_v4().to_string();
        let stats = Arc::new(AgentStats::new());

        let exporter = MetricsExporter::new(
            control_plane.clone(),
            &config.service_name,
            &instance_id,
            stats.clone(),
        );
        let registry = Arc::new(MetricsRegistry::new(
            exporter,
            RegistryConfig {
                flush_threshold: config.flush_threshold,
                flush_interval: config.flush_interval,
            },
            runtime.clone(),
            stats.clone(),
        ));
        let instruments = Instruments::new(registry.clone());

        let cache = Arc::new(BreakpointCache::new());
        let poller = Arc::new(BreakpointPoller::new(
            control_plane.clone(),
            cache.clone(),
            &config.service_name,
            stats.clone(),
        ));
        let registrar = AutoRegistrar::new(
            control_plane.clone(),
            poller.clone(),
            &config.service_name,
            config.register_poll_delay,
            runtime.clone(),
            stats.clone(),
        );
        let capture = SnapshotCapture::new(
            &config.service_name,
            cache.clone(),
            registrar,
            trace,
            control_plane,
            runtime.clone(),
            stats.clone(),
        );

        let shutdown = CancellationToken::new();
        let mut tasks = vec![runtime.spawn(registry.clone().run(shutdown.clone()))];
        if config.code_monitoring_enabled {
            tasks.push(runtime.spawn(poller.clone().run(config.poll_interval, shutdown.clone())));
        }

        info!(
            service = %config.service_name,
            instance_id = %instance_id,
            code_monitoring = config.code_monitoring_enabled,
            logging = ?logging,
            config = ?config.effective_summary(),
            "codewatch agent started"
        );

        Ok(Self {
            config,
            instance_id,
            stats,
            registry,
            instruments,
            cache,
            poller,
            capture,
            runtime,
            shutdown,
            tasks,
            stopped: false,
        })
    }

    /// Counter for the series `name` + `tags`. Repeated calls with the same
    /// series return the same counter.
    pub fn counter(&self, name: &str, tags: Tags) -> Arc<Counter> {
        self.instruments.counter(name, tags)
    }

    pub fn gauge(&self, name: &str, tags: Tags) -> Arc<Gauge> {
        self.instruments.gauge(name, tags)
    }

    pub fn histogram(&self, name: &str, tags: Tags) -> Histogram {
        self.instruments.histogram(name, tags)
    }

    /// Record one raw point without an instrument.
    pub fn record_metric(&self, name: &str, kind: MetricKind, value: f64, tags: Tags) {
        self.registry.record_metric(name, kind, value, Arc::new(tags));
    }

    /// Capture `variables` if a usable breakpoint matches this call site.
    ///
    /// Returns immediately. See [`CaptureOutcome`].
    pub fn capture(
        &self,
        label: &str,
        variables: &BTreeMap<String, Value>,
        location: &CaptureLocation,
    ) -> CaptureOutcome {
        if !self.config.code_monitoring_enabled {
            return CaptureOutcome::Disabled;
        }
        self.capture.capture(label, variables, location)
    }

    /// Export everything buffered now.
    pub async fn flush(&self) {
        self.registry.flush().await;
    }

    /// Refresh the breakpoint cache now, outside the regular schedule.
    pub async fn poll_now(&self) -> Result<usize, TransportError> {
        self.poller.poll_once().await
    }

    pub fn stats(&self) -> AgentStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn breakpoints(&self) -> &BreakpointCache {
        &self.cache
    }

    /// Stop both periodic tasks, then flush whatever is still buffered.
    ///
    /// Outstanding registrations and submissions are not awaited.
    pub async fn shutdown(mut self) {
        self.stopped = true;
        self.shutdown.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.registry.flush().await;
        info!(stats = ?self.stats.snapshot(), "codewatch agent stopped");
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        self.shutdown.cancel();
        if self.registry.buffered() > 0 {
            let registry = self.registry.clone();
            self.runtime.spawn(async move {
                registry.flush().await;
            });
        }
    }
}
