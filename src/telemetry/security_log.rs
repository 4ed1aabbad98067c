//! Security audit logging for captured data.
//!
//! SECURITY: every redaction and every snapshot that leaves the process is
//! logged here. Details carry variable names and detector subtypes only,
//! never the values themselves.

/// Security-relevant events raised by the capture path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A variable matched a PII detector and was redacted.
    PiiRedacted,
    /// A variable matched a credential detector and was redacted.
    CredentialRedacted,
    /// A snapshot was handed to the control plane.
    SnapshotSubmitted,
    /// A snapshot could not be delivered and was dropped.
    SnapshotDropped,
}

impl SecurityEvent {
    pub fn severity(&self) -> SecuritySeverity {
        match self {
            Self::PiiRedacted => SecuritySeverity::Warning,
            Self::CredentialRedacted => SecuritySeverity::Critical,
            Self::SnapshotSubmitted => SecuritySeverity::Debug,
            Self::SnapshotDropped => SecuritySeverity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PiiRedacted => "pii_redacted",
            Self::CredentialRedacted => "credential_redacted",
            Self::SnapshotSubmitted => "snapshot_submitted",
            Self::SnapshotDropped => "snapshot_dropped",
        }
    }
}

/// Severity levels for security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecuritySeverity {
    Debug,
    Info,
    Warning,
    Critical,
}

impl SecuritySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Log a security event with structured details.
///
/// # Example
/// ```
/// use codewatch_agent::telemetry::{log_security_event, SecurityEvent};
///
/// log_security_event(
///     SecurityEvent::PiiRedacted,
///     "Variable redacted before capture",
///     &[("variable", "email"), ("subtype", "email")],
/// );
/// ```
pub fn log_security_event(event: SecurityEvent, message: &str, details: &[(&str, &str)]) {
    let details_str = details
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");

    let event_type = event.as_str();
    let severity = event.severity().as_str();

    match event.severity() {
        SecuritySeverity::Debug => {
            tracing::debug!(event_type, severity, details = %details_str, "SECURITY {}", message)
        }
        SecuritySeverity::Info => {
            tracing::info!(event_type, severity, details = %details_str, "SECURITY {}", message)
        }
        SecuritySeverity::Warning => {
            tracing::warn!(event_type, severity, details = %details_str, "SECURITY {}", message)
        }
        SecuritySeverity::Critical => {
            tracing::error!(event_type, severity, details = %details_str, "SECURITY {}", message)
        }
    }
}
