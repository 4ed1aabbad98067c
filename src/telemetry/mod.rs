//! Telemetry about the agent itself.
//!
//! Structured logging setup, span helpers, the security audit log, and the
//! self-observability counters. The metrics the host application records
//! live in [`crate::metrics`].

mod logging;
pub mod security_log;
mod spans;
mod stats;

pub use logging::{
    init_logging, install_agent_logging, parse_filter, LogConfig, LogError, LogFormat, LogInstall,
};
pub use security_log::{log_security_event, SecurityEvent, SecuritySeverity};
pub use spans::{AgentSpan, SpanExt};
pub use stats::{AgentStats, AgentStatsSnapshot};
