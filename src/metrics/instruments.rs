//! Counter, Gauge and Histogram instruments.
//!
//! Each mutation updates the held value and emits a point while holding the
//! instrument's lock, so the emitted value always matches the mutation that
//! produced it.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

use super::point::{MetricKind, Tags};
use super::registry::MetricsRegistry;

#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Monotonic counter. Emits the cumulative total on every increment.
pub struct Counter {
    name: String,
    tags: Arc<Tags>,
    total: Mutex<f64>,
    registry: Arc<MetricsRegistry>,
}

impl Counter {
    pub fn new(name: impl Into<String>, tags: Tags, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name: name.into(),
            tags: Arc::new(tags),
            total: Mutex::new(0.0),
            registry,
        }
    }

    /// Add `value` to the total. Negative or non-finite values are rejected
    /// and leave the counter unchanged.
    pub fn add(&self, value: f64) -> Result<(), MetricError> {
        if !value.is_finite() || value < 0.0 {
            return Err(MetricError::InvalidArgument(format!(
                "counter '{}' cannot be incremented by {}",
                self.name, value
            )));
        }
        let mut total = self.total.lock();
        *total += value;
        self.registry
            .record_metric(&self.name, MetricKind::Counter, *total, self.tags.clone());
        Ok(())
    }

    pub fn inc(&self) {
        let mut total = self.total.lock();
        *total += 1.0;
        self.registry
            .record_metric(&self.name, MetricKind::Counter, *total, self.tags.clone());
    }

    pub fn value(&self) -> f64 {
        *self.total.lock()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Point-in-time value that can move both ways.
pub struct Gauge {
    name: String,
    tags: Arc<Tags>,
    current: Mutex<f64>,
    registry: Arc<MetricsRegistry>,
}

impl Gauge {
    pub fn new(name: impl Into<String>, tags: Tags, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name: name.into(),
            tags: Arc::new(tags),
            current: Mutex::new(0.0),
            registry,
        }
    }

    pub fn set(&self, value: f64) {
        self.update(|_| value);
    }

    pub fn inc(&self) {
        self.update(|v| v + 1.0);
    }

    pub fn dec(&self) {
        self.update(|v| v - 1.0);
    }

    pub fn value(&self) -> f64 {
        *self.current.lock()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn update(&self, f: impl FnOnce(f64) -> f64) {
        let mut current = self.current.lock();
        *current = f(*current);
        self.registry
            .record_metric(&self.name, MetricKind::Gauge, *current, self.tags.clone());
    }
}

type SeriesKey = (String, Tags);

/// One shared instrument per series.
///
/// Counter deltas are derived from the cumulative total of a series, so two
/// independent counters on the same name and tags would interleave their
/// totals. Handing out the same `Arc` for a series keeps one total.
pub struct Instruments {
    registry: Arc<MetricsRegistry>,
    counters: DashMap<SeriesKey, Arc<Counter>>,
    gauges: DashMap<SeriesKey, Arc<Gauge>>,
}

impl Instruments {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self {
            registry,
            counters: DashMap::new(),
            gauges: DashMap::new(),
        }
    }

    pub fn counter(&self, name: &str, tags: Tags) -> Arc<Counter> {
        self.counters
            .entry((name.to_string(), tags.clone()))
            .or_insert_with(|| Arc::new(Counter::new(name, tags, self.registry.clone())))
            .clone()
    }

    pub fn gauge(&self, name: &str, tags: Tags) -> Arc<Gauge> {
        self.gauges
            .entry((name.to_string(), tags.clone()))
            .or_insert_with(|| Arc::new(Gauge::new(name, tags, self.registry.clone())))
            .clone()
    }

    /// Histograms hold no state, so every call returns a fresh handle.
    pub fn histogram(&self, name: &str, tags: Tags) -> Histogram {
        Histogram::new(name, tags, self.registry.clone())
    }

    pub fn series_count(&self) -> usize {
        self.counters.len() + self.gauges.len()
    }
}

/// Raw observations; bucketing is left to the control plane.
pub struct Histogram {
    name: String,
    tags: Arc<Tags>,
    registry: Arc<MetricsRegistry>,
}

impl Histogram {
    pub fn new(name: impl Into<String>, tags: Tags, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name: name.into(),
            tags: Arc::new(tags),
            registry,
        }
    }

    pub fn record(&self, value: f64) {
        self.registry
            .record_metric(&self.name, MetricKind::Histogram, value, self.tags.clone());
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
