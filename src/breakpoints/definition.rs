//! Breakpoint definitions as served by the control plane.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

/// A server-managed capture directive. Read-only on the agent side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointDefinition {
    pub id: String,
    pub file_path: String,
    pub line_number: u32,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Zero means unlimited.
    #[serde(default)]
    pub max_captures: u64,
    #[serde(default)]
    pub capture_count: u64,
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
}

impl BreakpointDefinition {
    /// Whether a capture may use this definition at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.expire_at.map_or(true, |at| now < at)
            && (self.max_captures == 0 || self.capture_count < self.max_captures)
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    /// Label key, if the definition names a label.
    pub fn label_key(&self) -> Option<LabelKey> {
        self.label
            .as_deref()
            .map(|label| LabelKey::new(self.function_name.as_deref(), label))
    }

    pub fn location_key(&self) -> LocationKey {
        LocationKey::new(&self.file_path, self.line_number)
    }
}

/// Lookup by (function, label). A missing function name is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelKey {
    pub function_name: String,
    pub label: String,
}

impl LabelKey {
    pub fn new(function_name: Option<&str>, label: &str) -> Self {
        Self {
            function_name: function_name.unwrap_or_default().to_string(),
            label: label.to_string(),
        }
    }
}

/// Lookup by (file, line).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    pub file_path: String,
    pub line_number: u32,
}

impl LocationKey {
    pub fn new(file_path: &str, line_number: u32) -> Self {
        Self {
            file_path: file_path.to_string(),
            line_number,
        }
    }
}
