//! Converts buffered points into the wire payload and ships them.
//!
//! Counters arrive cumulative and leave as deltas. The exporter remembers the
//! last cumulative value per series (name + tags) to compute them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn, Instrument};

use super::payload::{
    Gauge, Histogram, HistogramDataPoint, KeyValue, Metric, MetricData, MetricsPayload,
    NumberDataPoint, Resource, ResourceMetrics, Scope, ScopeMetrics, Sum,
    AGGREGATION_TEMPORALITY_DELTA,
};
use super::point::{MetricKind, MetricPoint, Tags};
use crate::telemetry::{AgentSpan, AgentStats, SpanExt};
use crate::transport::ControlPlane;

const SCOPE_NAME: &str = "codewatch-agent";

type SeriesKey = (String, Tags);

/// Serializes batches and POSTs them, best-effort.
pub struct MetricsExporter {
    control_plane: Arc<dyn ControlPlane>,
    service_name: String,
    resource: Resource,
    last_cumulative: Mutex<HashMap<SeriesKey, f64>>,
    stats: Arc<AgentStats>,
}

impl MetricsExporter {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        service_name: &str,
        instance_id: &str,
        stats: Arc<AgentStats>,
    ) -> Self {
        let mut attributes = vec![
            KeyValue::string("service.name", service_name),
            KeyValue::string("service.instance.id", instance_id),
            KeyValue::string("telemetry.sdk.name", SCOPE_NAME),
        ];
        if let Ok(host) = hostname::get() {
            attributes.push(KeyValue::string("host.name", host.to_string_lossy()));
        }

        Self {
            control_plane,
            service_name: service_name.to_string(),
            resource: Resource { attributes },
            last_cumulative: Mutex::new(HashMap::new()),
            stats,
        }
    }

    /// Export one batch. Failures are logged and the batch is discarded.
    pub async fn export(&self, batch: Vec<MetricPoint>) {
        if batch.is_empty() {
            return;
        }
        let points = batch.len();
        let payload = self.build_payload(&batch);
        let span = AgentSpan::export(&self.service_name, points);

        let result = self
            .control_plane
            .export_metrics(&payload)
            .instrument(span.clone())
            .await;
        span.record_result(&result);

        match result {
            Ok(()) => {
                self.stats.record_export(points, true);
                debug!(points, "metrics batch exported");
            }
            Err(e) => {
                self.stats.record_export(points, false);
                warn!(error = %e, points, "metrics export failed, batch dropped");
            }
        }
    }

    /// Group `batch` by (name, kind) and build the wire payload.
    ///
    /// Advances the per-series counter state, so each batch must be built once.
    pub fn build_payload(&self, batch: &[MetricPoint]) -> MetricsPayload {
        let mut groups: BTreeMap<(&str, MetricKind), Vec<&MetricPoint>> = BTreeMap::new();
        for point in batch {
            groups
                .entry((point.name.as_str(), point.kind))
                .or_default()
                .push(point);
        }

        let metrics = groups
            .into_iter()
            .map(|((name, kind), points)| Metric {
                name: name.to_string(),
                data: match kind {
                    MetricKind::Counter => MetricData::Sum(self.counter_series(&points)),
                    MetricKind::Gauge => MetricData::Gauge(gauge_series(&points)),
                    MetricKind::Histogram => MetricData::Histogram(histogram_series(&points)),
                },
            })
            .collect();

        MetricsPayload {
            resource_metrics: vec![ResourceMetrics {
                resource: self.resource.clone(),
                scope_metrics: vec![ScopeMetrics {
                    scope: Scope {
                        name: SCOPE_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    metrics,
                }],
            }],
        }
    }

    fn counter_series(&self, points: &[&MetricPoint]) -> Sum {
        let mut last = self.last_cumulative.lock();
        let data_points = points
            .iter()
            .map(|p| {
                let key = (p.name.clone(), (*p.tags).clone());
                let previous = last.insert(key, p.value);
                number_point(p, cumulative_delta(previous, p.value))
            })
            .collect();

        Sum {
            data_points,
            aggregation_temporality: AGGREGATION_TEMPORALITY_DELTA,
            is_monotonic: true,
        }
    }
}

/// Delta between two cumulative readings. A drop means the counter was
/// recreated, so the whole new value is the delta.
fn cumulative_delta(previous: Option<f64>, current: f64) -> f64 {
    match previous {
        Some(prev) if current >= prev => current - prev,
        _ => current,
    }
}

fn gauge_series(points: &[&MetricPoint]) -> Gauge {
    Gauge {
        data_points: points.iter().map(|p| number_point(p, p.value)).collect(),
    }
}

fn histogram_series(points: &[&MetricPoint]) -> Histogram {
    let data_points = points
        .iter()
        .map(|p| HistogramDataPoint {
            attributes: attributes(&p.tags),
            time_unix_nano: p.timestamp_nanos.to_string(),
            count: "1".to_string(),
            sum: p.value,
            min: p.value,
            max: p.value,
            bucket_counts: vec!["1".to_string()],
            explicit_bounds: Vec::new(),
        })
        .collect();

    Histogram {
        data_points,
        aggregation_temporality: AGGREGATION_TEMPORALITY_DELTA,
    }
}

fn number_point(point: &MetricPoint, value: f64) -> NumberDataPoint {
    NumberDataPoint {
        attributes: attributes(&point.tags),
        time_unix_nano: point.timestamp_nanos.to_string(),
        as_double: value,
    }
}

fn attributes(tags: &Tags) -> Vec<KeyValue> {
    tags.iter().map(|(k, v)| KeyValue::string(k, v)).collect()
}
