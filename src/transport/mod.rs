//! The seam between the agent and the control plane.
//!
//! Every component talks to the control plane through [`ControlPlane`]. The
//! production implementation is [`HttpControlPlane`]; [`InMemoryControlPlane`]
//! records calls for host-application tests and offline runs.
//!
//! Failures here are always transient from the agent's point of view: callers
//! log and drop them. Nothing is retried.

mod http;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::breakpoints::{BreakpointDefinition, Registration};
use crate::capture::Snapshot;
use crate::metrics::MetricsPayload;

pub use http::{HttpControlPlane, API_KEY_HEADER};
pub use memory::InMemoryControlPlane;

pub const METRICS_PATH: &str = "/v1/metrics";
pub const ACTIVE_BREAKPOINTS_PATH: &str = "/sdk/snapshots/active";
pub const REGISTER_PATH: &str = "/sdk/snapshots/register";
pub const SNAPSHOTS_PATH: &str = "/sdk/snapshots";

/// Any failure reaching the control plane.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Control plane returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Control plane unavailable: {0}")]
    Unavailable(String),
}

/// Operations the agent performs against the control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// POST one batch of metrics.
    async fn export_metrics(&self, payload: &MetricsPayload) -> Result<(), TransportError>;

    /// GET the full list of active breakpoints for `service_name`.
    async fn fetch_active_breakpoints(
        &self,
        service_name: &str,
    ) -> Result<Vec<BreakpointDefinition>, TransportError>;

    /// Register one code location.
    async fn register_location(&self, registration: &Registration) -> Result<(), TransportError>;

    /// Submit one captured snapshot.
    async fn submit_snapshot(&self, snapshot: &Snapshot) -> Result<(), TransportError>;
}
