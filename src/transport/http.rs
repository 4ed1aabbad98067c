//! reqwest-backed control-plane client.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use tracing::debug;

use super::{
    ControlPlane, TransportError, ACTIVE_BREAKPOINTS_PATH, METRICS_PATH, REGISTER_PATH,
    SNAPSHOTS_PATH,
};
use crate::breakpoints::{BreakpointDefinition, Registration};
use crate::capture::Snapshot;
use crate::config::AgentConfig;
use crate::endpoint;
use crate::metrics::MetricsPayload;

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// The active-breakpoint list, either bare or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum ActiveBreakpoints {
    List(Vec<BreakpointDefinition>),
    Wrapped { breakpoints: Vec<BreakpointDefinition> },
}

impl ActiveBreakpoints {
    fn into_vec(self) -> Vec<BreakpointDefinition> {
        match self {
            Self::List(list) => list,
            Self::Wrapped { breakpoints } => breakpoints,
        }
    }
}

/// HTTP client for the control plane.
pub struct HttpControlPlane {
    client: Client,
    api_key: String,
    endpoint: String,
    use_ssl: bool,
}

impl HttpControlPlane {
    /// Build a client whose every request is bounded by `config.export_timeout`.
    pub fn new(config: &AgentConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.export_timeout)
            .user_agent(concat!("codewatch-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            use_ssl: config.use_ssl,
        })
    }

    /// Resolve `path` against the configured endpoint.
    pub fn url(&self, path: &str) -> String {
        endpoint::resolve(&self.endpoint, path, self.use_ssl)
    }

    fn active_url(&self, service_name: &str) -> Result<Url, TransportError> {
        let base = self.url(ACTIVE_BREAKPOINTS_PATH);
        let mut url = Url::parse(&base).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(base.clone()))?
            .push(service_name);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, &self.api_key)
    }

    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(TransportError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn export_metrics(&self, payload: &MetricsPayload) -> Result<(), TransportError> {
        let url = self.url(METRICS_PATH);
        let response = self
            .authorized(self.client.post(&url))
            .json(payload)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(%url, "metrics batch accepted");
        Ok(())
    }

    async fn fetch_active_breakpoints(
        &self,
        service_name: &str,
    ) -> Result<Vec<BreakpointDefinition>, TransportError> {
        let url = self.active_url(service_name)?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::check(response).await?;
        let body = response.bytes().await?;
        let active: ActiveBreakpoints = serde_json::from_slice(&body)?;
        Ok(active.into_vec())
    }

    async fn register_location(&self, registration: &Registration) -> Result<(), TransportError> {
        let response = self
            .authorized(self.client.post(self.url(REGISTER_PATH)))
            .json(registration)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn submit_snapshot(&self, snapshot: &Snapshot) -> Result<(), TransportError> {
        let response = self
            .authorized(self.client.post(self.url(SNAPSHOTS_PATH)))
            .json(snapshot)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
