use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::security::SecurityFlag;

/// One capture of redacted variable state. Built once, submitted once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub breakpoint_id: String,
    pub service_name: String,
    pub file_path: String,
    pub function_name: Option<String>,
    pub label: Option<String>,
    pub line_number: u32,
    /// Post-redaction values only.
    pub variables: BTreeMap<String, Value>,
    pub security_flags: Vec<SecurityFlag>,
    pub stack_trace: String,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub captured_at: DateTime<Utc>,
}
