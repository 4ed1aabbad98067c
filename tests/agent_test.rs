//! Agent lifecycle tests: startup validation, background tasks, shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use codewatch_agent::capture::{CaptureOutcome, NoTraceContext};
use codewatch_agent::metrics::{tags, MetricKind, Tags};
use codewatch_agent::telemetry::LogError;
use codewatch_agent::transport::InMemoryControlPlane;
use codewatch_agent::{capture_location, Agent, AgentConfig, AgentError, ConfigError};

fn config() -> AgentConfig {
    AgentConfig::new("cw_test_key", "checkout-svc", "localhost:8080")
}

fn start(config: AgentConfig, cp: &Arc<InMemoryControlPlane>) -> Agent {
    Agent::start_with(config, cp.clone(), Arc::new(NoTraceContext)).unwrap()
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn start_rejects_missing_api_key() {
    let mut config = config();
    config.api_key = String::new();

    let err = Agent::start(config).err().unwrap();
    assert!(matches!(err, AgentError::Config(ConfigError::MissingApiKey)));
}

#[tokio::test]
async fn start_rejects_missing_service_name() {
    let mut config = config();
    config.service_name = "  ".to_string();
    let cp = Arc::new(InMemoryControlPlane::new());

    let err = Agent::start_with(config, cp.clone(), Arc::new(NoTraceContext))
        .err()
        .unwrap();
    assert!(matches!(err, AgentError::Config(ConfigError::MissingServiceName)));
    assert_eq!(cp.fetch_count(), 0);
}

#[test]
fn start_outside_runtime_fails() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let err = Agent::start_with(config(), cp, Arc::new(NoTraceContext))
        .err()
        .unwrap();
    assert!(matches!(err, AgentError::NoRuntime));
}

#[tokio::test]
async fn start_rejects_endpoint_without_host() {
    for endpoint in ["https://", "http://"] {
        let mut config = config();
        config.endpoint = endpoint.to_string();

        let err = Agent::start(config).err().unwrap();
        assert!(matches!(err, AgentError::Config(ConfigError::MissingEndpoint)));
    }
}

#[tokio::test]
async fn start_rejects_invalid_log_filter() {
    let mut config = config();
    config.log.level = "codewatch_agent=loud".to_string();
    let cp = Arc::new(InMemoryControlPlane::new());

    let err = Agent::start_with(config, cp.clone(), Arc::new(NoTraceContext))
        .err()
        .unwrap();
    assert!(matches!(err, AgentError::Logging(LogError::InvalidFilter(_))));
    assert_eq!(cp.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_polls_immediately() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(config(), &cp);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cp.fetch_count(), 1);
    assert_eq!(agent.stats().polls_succeeded, 1);
    assert!(!agent.instance_id().is_empty());

    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poll_interval_is_honored() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let mut config = config();
    config.poll_interval = Duration::from_secs(5);
    let agent = start(config, &cp);

    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(cp.fetch_count(), 5);

    agent.shutdown().await;
}

// =============================================================================
// Code monitoring switch
// =============================================================================

#[tokio::test(start_paused = true)]
async fn disabled_monitoring_skips_polling_and_capture() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let mut config = config();
    config.code_monitoring_enabled = false;
    let agent = start(config, &cp);

    let outcome = agent.capture("charge", &BTreeMap::new(), &capture_location!("checkout"));
    assert_eq!(outcome, CaptureOutcome::Disabled);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(cp.fetch_count(), 0);
    assert!(cp.registrations().is_empty());

    agent.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disabled_monitoring_still_exports_metrics() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let mut config = config();
    config.code_monitoring_enabled = false;
    let agent = start(config, &cp);

    agent.record_metric("queue_depth", MetricKind::Gauge, 3.0, Tags::new());
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(cp.exported_point_count(), 1);

    agent.shutdown().await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_buffered_points() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(config(), &cp);

    let requests = agent.counter("requests_total", tags([("route", "/pay")]));
    for _ in 0..5 {
        requests.inc();
    }
    assert!(cp.exports().is_empty());

    agent.shutdown().await;
    assert_eq!(cp.exported_point_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_periodic_tasks() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(config(), &cp);
    tokio::time::sleep(Duration::from_millis(10)).await;

    agent.shutdown().await;
    let fetches = cp.fetch_count();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(cp.fetch_count(), fetches);
}

#[tokio::test(start_paused = true)]
async fn shutdown_with_empty_buffer_exports_nothing() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(config(), &cp);
    agent.shutdown().await;
    assert!(cp.exports().is_empty());
}

// =============================================================================
// Stats
// =============================================================================

#[tokio::test(start_paused = true)]
async fn stats_track_export_failures() {
    let cp = Arc::new(InMemoryControlPlane::new());
    let agent = start(config(), &cp);
    cp.set_failing(true);

    agent.histogram("latency_ms", Tags::new()).record(12.5);
    agent.flush().await;

    let stats = agent.stats();
    assert_eq!(stats.points_recorded, 1);
    assert_eq!(stats.export_failures, 1);
    assert_eq!(stats.points_exported, 0);

    agent.shutdown().await;
}
