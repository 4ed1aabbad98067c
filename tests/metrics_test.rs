//! Metrics pipeline tests: instruments through registry to the exported payload.

use std::sync::Arc;
use std::time::Duration;

use codewatch_agent::capture::NoTraceContext;
use codewatch_agent::metrics::payload::{Metric, MetricData};
use codewatch_agent::metrics::{tags, MetricError, MetricsPayload, Tags};
use codewatch_agent::transport::InMemoryControlPlane;
use codewatch_agent::{Agent, AgentConfig};
use tokio_test::assert_ok;

fn start(cp: &Arc<InMemoryControlPlane>, flush_interval: Duration) -> Agent {
    let mut config = AgentConfig::new("cw_test_key", "metrics-svc", "localhost:8080");
    config.code_monitoring_enabled = false;
    config.flush_interval = flush_interval;
    Agent::start_with(config, cp.clone(), Arc::new(NoTraceContext)).unwrap()
}

fn metrics_named<'a>(exports: &'a [MetricsPayload], name: &'a str) -> impl Iterator<Item = &'a Metric> {
    exports
        .iter()
        .flat_map(|p| &p.resource_metrics)
        .flat_map(|rm| &rm.scope_metrics)
        .flat_map(|sm| &sm.metrics)
        .filter(move |m| m.name == name)
}

// =============================================================================
// Flush Guarantees
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_recording_exports_every_point_exactly_once() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_millis(20));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let latency = agent.histogram("latency_ms", Tags::new());
            std::thread::spawn(move || {
                for i in 0..PER_THREAD {
                    latency.record((t * 1000 + i) as f64);
                    if i % 50 == 0 {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    agent.flush().await;

    let exports = cp.exports();
    let mut seen: Vec<u64> = metrics_named(&exports, "latency_ms")
        .flat_map(|m| match &m.data {
            MetricData::Histogram(h) => h.data_points.iter().map(|p| p.sum as u64).collect::<Vec<_>>(),
            _ => Vec::new(),
        })
        .collect();
    seen.sort_unstable();

    let mut expected: Vec<u64> = (0..THREADS)
        .flat_map(|t| (0..PER_THREAD).map(move |i| (t * 1000 + i) as u64))
        .collect();
    expected.sort_unstable();

    assert_eq!(seen, expected);
    assert!(exports.len() > 1, "expected several batches, got {}", exports.len());
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn threshold_flush_does_not_wait_for_interval() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_secs(10));

    let depth = agent.gauge("queue_depth", Tags::new());
    for i in 0..100 {
        depth.set(i as f64);
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(cp.exports().len(), 1);
    assert_eq!(cp.exported_point_count(), 100);
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interval_flush_exports_partial_batch() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_secs(10));

    agent.histogram("latency_ms", Tags::new()).record(3.0);
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(cp.exports().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cp.exported_point_count(), 1);
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn export_failure_drops_batch_without_retry() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_secs(10));

    cp.set_failing(true);
    agent.histogram("latency_ms", Tags::new()).record(1.0);
    agent.flush().await;

    cp.set_failing(false);
    agent.histogram("latency_ms", Tags::new()).record(2.0);
    agent.flush().await;

    assert_eq!(cp.exported_point_count(), 1);
    agent.shutdown().await;
}

// =============================================================================
// Counter Semantics
// =============================================================================

#[tokio::test(start_paused = true)]
async fn negative_counter_add_is_rejected() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_secs(10));
    let counter = agent.counter("orders_total", Tags::new());

    assert_ok!(counter.add(2.0));
    let err = counter.add(-1.0).unwrap_err();
    assert!(matches!(err, MetricError::InvalidArgument(_)));
    assert_eq!(counter.value(), 2.0);

    agent.flush().await;
    assert_eq!(cp.exported_point_count(), 1);
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn counter_deltas_sum_to_total_across_batches() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_secs(10));
    let orders = agent.counter("orders_total", tags([("region", "eu")]));

    for _ in 0..3 {
        assert_ok!(orders.add(5.0));
    }
    agent.flush().await;
    for _ in 0..4 {
        orders.inc();
    }
    agent.flush().await;

    let exports = cp.exports();
    let mut total = 0.0;
    for metric in metrics_named(&exports, "orders_total") {
        let MetricData::Sum(sum) = &metric.data else {
            panic!("counter exported as {:?}", metric.data);
        };
        assert!(sum.is_monotonic);
        assert_eq!(sum.aggregation_temporality, 1);
        total += sum.data_points.iter().map(|p| p.as_double).sum::<f64>();
    }
    assert_eq!(total, 19.0);
    assert_eq!(orders.value(), 19.0);
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn handles_on_one_series_share_the_total() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_secs(10));
    let a = agent.counter("orders_total", Tags::new());
    let b = agent.counter("orders_total", Tags::new());

    a.inc();
    b.inc();
    a.inc();
    b.inc();
    agent.flush().await;
    assert_ok!(b.add(3.0));
    agent.flush().await;

    let exports = cp.exports();
    let total: f64 = metrics_named(&exports, "orders_total")
        .map(|metric| match &metric.data {
            MetricData::Sum(sum) => sum.data_points.iter().map(|p| p.as_double).sum::<f64>(),
            other => panic!("counter exported as {:?}", other),
        })
        .sum();
    assert_eq!(total, 7.0);
    assert_eq!(a.value(), 7.0);
    agent.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counter_handles_per_thread_lose_no_increments() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_millis(20));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let hits = agent.counter("hits_total", tags([("route", "/pay")]));
            std::thread::spawn(move || {
                for _ in 0..500 {
                    hits.inc();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    agent.flush().await;

    let exports = cp.exports();
    let total: f64 = metrics_named(&exports, "hits_total")
        .map(|metric| match &metric.data {
            MetricData::Sum(sum) => sum.data_points.iter().map(|p| p.as_double).sum::<f64>(),
            other => panic!("counter exported as {:?}", other),
        })
        .sum();
    assert_eq!(total, 2000.0);
    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn payload_carries_service_identity() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(&cp, Duration::from_secs(10));

    agent.gauge("temperature", tags([("room", "a")])).set(21.5);
    agent.flush().await;

    let exports = cp.exports();
    let attrs = &exports[0].resource_metrics[0].resource.attributes;
    let service = attrs.iter().find(|kv| kv.key == "service.name").unwrap();
    assert_eq!(service.value.string_value, "metrics-svc");
    let instance = attrs.iter().find(|kv| kv.key == "service.instance.id").unwrap();
    assert_eq!(instance.value.string_value, agent.instance_id());

    let metric = exports[0].metric("temperature").unwrap();
    let MetricData::Gauge(gauge) = &metric.data else {
        panic!("gauge exported as {:?}", metric.data);
    };
    assert_eq!(gauge.data_points[0].as_double, 21.5);
    assert_eq!(gauge.data_points[0].attributes[0].key, "room");
    agent.shutdown().await;
}
