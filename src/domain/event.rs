use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Severity attached to a timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Ok,
    Warn,
    Error,
}

impl EventStatus {
    /// Map a free-form log severity (`ERROR`, `warning`, ...) onto an event status.
    pub fn from_severity(severity: &str) -> Self {
        match severity.trim().to_ascii_uppercase().as_str() {
            "ERROR" | "FATAL" | "CRITICAL" => EventStatus::Error,
            "WARN" | "WARNING" => EventStatus::Warn,
            _ => EventStatus::Ok,
        }
    }
}

/// Variant-specific event fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Span {
        trace_id: String,
        span_id: String,
        latency_ms: Option<f64>,
        error: bool,
    },
    Log {
        trace_id: String,
        span_id: String,
        severity: Option<String>,
    },
    CodeChange {
        change_id: String,
        commit_sha: Option<String>,
        pr_number: Option<u64>,
        files_changed: usize,
    },
}

/// Immutable timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub status: EventStatus,
    pub dedup_key: String,
    pub payload: Option<String>,
}

impl Event {
    pub fn is_span(&self) -> bool {
        matches!(self.kind, EventKind::Span { .. })
    }

    /// Error-status span; the only event that counts toward the error threshold.
    pub fn is_error_span(&self) -> bool {
        self.is_span() && self.status == EventStatus::Error
    }

    pub fn is_code_change(&self) -> bool {
        matches!(self.kind, EventKind::CodeChange { .. })
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            EventKind::Span { .. } => "span",
            EventKind::Log { .. } => "log",
            EventKind::CodeChange { .. } => "code_change",
        }
    }
}
