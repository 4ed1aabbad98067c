//! Subscriber setup for the agent's own diagnostics.
//!
//! [`crate::Agent::start`] installs a subscriber from [`AgentConfig::log`]
//! unless the host already owns one or has turned installation off.
//!
//! [`AgentConfig::log`]: crate::AgentConfig::log

use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Install a global subscriber when the agent starts.
    pub install: bool,
    pub format: LogFormat,
    /// Filter directive (e.g., "info", "codewatch_agent=debug").
    pub level: String,
    /// Log file. Stderr when unset.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            install: true,
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// What agent startup did about logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogInstall {
    Installed,
    /// Another subscriber was already set; the agent logs through it.
    HostOwned,
    Disabled,
}

/// Parse a filter directive without installing anything.
pub fn parse_filter(level: &str) -> Result<EnvFilter, LogError> {
    EnvFilter::try_new(level).map_err(|e| LogError::InvalidFilter(e.to_string()))
}

/// Install a global subscriber built from `config`.
///
/// Fails with [`LogError::AlreadyInitialized`] if any subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = parse_filter(&config.level)?;
    let writer = match &config.output_path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| LogError::FileOpen(e.to_string()))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)
}

/// Startup variant of [`init_logging`]: a host-owned subscriber is not an error.
pub fn install_agent_logging(config: &LogConfig) -> Result<LogInstall, LogError> {
    if !config.install {
        return Ok(LogInstall::Disabled);
    }
    match init_logging(config) {
        Ok(()) => Ok(LogInstall::Installed),
        Err(LogError::AlreadyInitialized) => Ok(LogInstall::HostOwned),
        Err(e) => Err(e),
    }
}
