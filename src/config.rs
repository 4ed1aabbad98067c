//! Agent configuration and loading from environment variables.
//!
//! Values are taken either from [`AgentConfig::new`] plus field overrides, or
//! from `CODEWATCH_*` environment variables via [`load`]. Invalid numeric
//! values fall back to defaults without crashing; missing identity does not,
//! and is reported by [`AgentConfig::validate`] when the agent starts.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `CODEWATCH_API_KEY` | (required) | Control-plane API key |
//! | `CODEWATCH_SERVICE_NAME` | (required) | Service identity attached to all telemetry |
//! | `CODEWATCH_ENDPOINT` | `app.codewatch.dev` | Bare host, host with scheme, or full URL |
//! | `CODEWATCH_USE_SSL` | true | Scheme for endpoints given without one |
//! | `CODEWATCH_POLL_INTERVAL` | 30 | Breakpoint poll interval (secs) |
//! | `CODEWATCH_CODE_MONITORING` | true | Enable breakpoint polling and capture |
//! | `CODEWATCH_LOG_LEVEL` | info | Filter for the agent's own logs (ignored if unparsable) |
//! | `CODEWATCH_LOG_INSTALL` | true | Install a subscriber at start if the host has none |

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::endpoint;
use crate::telemetry::{parse_filter, LogConfig};

pub const DEFAULT_ENDPOINT: &str = "app.codewatch.dev";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REGISTER_POLL_DELAY: Duration = Duration::from_secs(1);

/// Errors raised while validating configuration. Fatal: the agent does not start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API key is required")]
    MissingApiKey,
    #[error("Service name is required")]
    MissingServiceName,
    #[error("Endpoint host is required")]
    MissingEndpoint,
    #[error("Poll interval must be at least one second")]
    InvalidPollInterval,
}

/// Everything the agent needs to talk to the control plane.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: String,
    pub service_name: String,
    pub endpoint: String,
    pub use_ssl: bool,
    pub poll_interval: Duration,
    pub code_monitoring_enabled: bool,
    /// Buffered points that trigger an immediate flush.
    pub flush_threshold: usize,
    /// Maximum time a point waits in the buffer.
    pub flush_interval: Duration,
    pub export_timeout: Duration,
    /// Delay before the extra poll that follows a successful registration.
    pub register_poll_delay: Duration,
    pub log: LogConfig,
}

impl AgentConfig {
    pub fn new(
        api_key: impl Into<String>,
        service_name: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            service_name: service_name.into(),
            endpoint: endpoint.into(),
            use_ssl: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            code_monitoring_enabled: true,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
            register_poll_delay: DEFAULT_REGISTER_POLL_DELAY,
            log: LogConfig::default(),
        }
    }

    /// Check required identity. Called by [`crate::Agent::start`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::MissingServiceName);
        }
        if endpoint::host(self.endpoint.trim()).is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.poll_interval < Duration::from_secs(1) {
            return Err(ConfigError::InvalidPollInterval);
        }
        Ok(())
    }

    /// Return a serializable summary of all effective values, key masked.
    pub fn effective_summary(&self) -> EffectiveConfig {
        EffectiveConfig {
            api_key: mask_key(&self.api_key),
            service_name: self.service_name.clone(),
            endpoint: self.endpoint.clone(),
            use_ssl: self.use_ssl,
            poll_interval_secs: self.poll_interval.as_secs(),
            code_monitoring_enabled: self.code_monitoring_enabled,
            flush_threshold: self.flush_threshold,
            flush_interval_secs: self.flush_interval.as_secs(),
            export_timeout_secs: self.export_timeout.as_secs(),
        }
    }
}

/// Effective configuration summary (serializable, safe to log).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub api_key: String,
    pub service_name: String,
    pub endpoint: String,
    pub use_ssl: bool,
    pub poll_interval_secs: u64,
    pub code_monitoring_enabled: bool,
    pub flush_threshold: usize,
    pub flush_interval_secs: u64,
    pub export_timeout_secs: u64,
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`true/false/1/0/yes/no/on/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Load agent configuration from environment variables.
///
/// Identity fields default to empty strings; [`AgentConfig::validate`]
/// rejects them when the agent starts.
pub fn load() -> AgentConfig {
    let api_key = std::env::var("CODEWATCH_API_KEY").unwrap_or_default();
    let service_name = std::env::var("CODEWATCH_SERVICE_NAME").unwrap_or_default();
    let endpoint = std::env::var("CODEWATCH_ENDPOINT")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let poll_secs = parse_u64("CODEWATCH_POLL_INTERVAL", DEFAULT_POLL_INTERVAL.as_secs());
    let poll_secs = poll_secs.max(1);

    let mut config = AgentConfig::new(api_key, service_name, endpoint);
    config.use_ssl = parse_bool("CODEWATCH_USE_SSL", true);
    config.poll_interval = Duration::from_secs(poll_secs);
    config.code_monitoring_enabled = parse_bool("CODEWATCH_CODE_MONITORING", true);
    if let Ok(level) = std::env::var("CODEWATCH_LOG_LEVEL") {
        if parse_filter(&level).is_ok() {
            config.log.level = level;
        }
    }
    config.log.install = parse_bool("CODEWATCH_LOG_INSTALL", true);
    config
}
