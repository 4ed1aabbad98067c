//! Process-wide buffer of metric points with dual-trigger flushing.
//!
//! Points are appended under a short `parking_lot` lock and drained by
//! swap-and-clear. A flush runs when the buffer reaches the threshold or
//! when the flush interval has elapsed since the previous flush, whichever
//! comes first. All flushes pass through one async gate, so a batch is
//! never exported twice and batches leave in drain order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::exporter::MetricsExporter;
use super::point::{MetricKind, MetricPoint, Tags};
use crate::telemetry::AgentStats;

/// Configuration for the registry's flush triggers.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub flush_threshold: usize,
    pub flush_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            flush_threshold: crate::config::DEFAULT_FLUSH_THRESHOLD,
            flush_interval: crate::config::DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Shared point buffer. Instruments hold an `Arc` to it.
pub struct MetricsRegistry {
    buffer: Mutex<Vec<MetricPoint>>,
    flush_gate: tokio::sync::Mutex<()>,
    flush_scheduled: AtomicBool,
    last_flush: Mutex<Instant>,
    exporter: MetricsExporter,
    config: RegistryConfig,
    runtime: Handle,
    stats: Arc<AgentStats>,
}

impl MetricsRegistry {
    /// `runtime` runs threshold-triggered flushes, so recording never waits
    /// on the network.
    pub fn new(
        exporter: MetricsExporter,
        config: RegistryConfig,
        runtime: Handle,
        stats: Arc<AgentStats>,
    ) -> Self {
        let threshold = config.flush_threshold.max(1);
        Self {
            buffer: Mutex::new(Vec::new()),
            flush_gate: tokio::sync::Mutex::new(()),
            flush_scheduled: AtomicBool::new(false),
            last_flush: Mutex::new(Instant::now()),
            exporter,
            config: RegistryConfig {
                flush_threshold: threshold,
                ..config
            },
            runtime,
            stats,
        }
    }

    /// Append a point. Schedules a background flush once the threshold is hit.
    pub fn record_metric(
        self: &Arc<Self>,
        name: &str,
        kind: MetricKind,
        value: f64,
        tags: Arc<Tags>,
    ) {
        self.push(MetricPoint::new(name, kind, value, tags));
    }

    pub(crate) fn push(self: &Arc<Self>, point: MetricPoint) {
        let len = {
            let mut buffer = self.buffer.lock();
            buffer.push(point);
            buffer.len()
        };
        self.stats.record_point();

        if len >= self.config.flush_threshold && !self.flush_scheduled.swap(true, Ordering::AcqRel) {
            let registry = Arc::clone(self);
            self.runtime.spawn(async move {
                registry.flush().await;
            });
        }
    }

    /// Number of points waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Drain the whole buffer and export it. Empty buffers are a no-op.
    pub async fn flush(&self) {
        let _gate = self.flush_gate.lock().await;
        self.flush_scheduled.store(false, Ordering::Release);
        *self.last_flush.lock() = Instant::now();

        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return;
        }
        debug!(points = batch.len(), "flushing metrics buffer");
        self.exporter.export(batch).await;
    }

    /// Flush whenever `flush_interval` passes without any other flush.
    /// Returns when `shutdown` is cancelled; the final flush is the caller's.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.flush_interval.as_secs(),
            threshold = self.config.flush_threshold,
            "metrics flush loop started"
        );

        loop {
            let deadline = *self.last_flush.lock() + self.config.flush_interval;
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("metrics flush loop stopping");
                    break;
                }
                () = tokio::time::sleep_until(deadline) => {
                    if Instant::now() >= *self.last_flush.lock() + self.config.flush_interval {
                        self.flush().await;
                    }
                }
            }
        }
    }
}
