//! Normalized inputs consumed by the graph core.
//!
//! Wire-level telemetry and change webhooks are decoded elsewhere; these are
//! the already-normalized shapes handed to the Graph Builder and the Event
//! Correlator.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Signal carried by a telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Span,
    Log,
}

/// Span outcome as reported by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    #[default]
    Ok,
    Error,
}

/// One normalized span or log record.
///
/// `service_name` is the service that emitted the record (the callee for a
/// span); `peer_service`, when present, names the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedTelemetryRecord {
    pub kind: RecordKind,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub peer_service: Option<String>,
    #[serde(default)]
    pub status: SpanStatus,
    #[serde(default)]
    pub severity: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NormalizedTelemetryRecord {
    /// Caller named explicitly on the record, ignoring blanks and self references.
    pub fn explicit_caller(&self) -> Option<&str> {
        self.peer_service
            .as_deref()
            .map(str::trim)
            .filter(|peer| !peer.is_empty() && *peer != self.service_name.trim())
    }

    pub fn parent_span(&self) -> Option<&str> {
        self.parent_span_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Kind of source-control activity behind a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Push,
    PullRequest,
}

/// A single file touched by a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileChange {
    pub filename: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub patch: Option<String>,
}

/// Code-change event already matched to a service by the change ingester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChangeEvent {
    pub service_id: String,
    pub event_type: ChangeKind,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub pr_number: Option<u64>,
    #[serde(default)]
    pub files: Vec<FileChange>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Stable identifier used to deduplicate re-delivered changes.
    pub fn change_id(&self) -> String {
        match (self.event_type, self.pr_number, self.commit_sha.as_deref()) {
            (ChangeKind::PullRequest, Some(pr), Some(sha)) => format!("pr:{pr}:{sha}"),
            (ChangeKind::PullRequest, Some(pr), None) => {
                format!("pr:{pr}@{}", self.timestamp.timestamp())
            }
            (_, _, Some(sha)) => format!("commit:{sha}"),
            _ => format!(
                "{}:{}@{}",
                self.kind_label(),
                self.service_id,
                self.timestamp.timestamp()
            ),
        }
    }

    /// Dedup key of the `code_change` timeline event mirroring this change.
    pub fn timeline_key(&self) -> String {
        format!("change:{}", self.change_id())
    }

    pub fn kind_label(&self) -> &'static str {
        match self.event_type {
            ChangeKind::Push => "push",
            ChangeKind::PullRequest => "pull_request",
        }
    }

    /// One-line description, e.g. `push abc1234: 2 files (+10/-3)`.
    pub fn summary(&self) -> String {
        let reference = match (self.pr_number, self.commit_sha.as_deref()) {
            (Some(pr), _) => format!("#{pr}"),
            (None, Some(sha)) => sha.chars().take(7).collect(),
            (None, None) => "unknown".to_string(),
        };
        let additions: u32 = self.files.iter().map(|f| f.additions).sum();
        let deletions: u32 = self.files.iter().map(|f| f.deletions).sum();
        format!(
            "{} {}: {} files (+{}/-{})",
            self.kind_label(),
            reference,
            self.files.len(),
            additions,
            deletions
        )
    }
}
