//! Record and change-event builders for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rootscout::domain::builder::{BuilderParams, GraphBuilder};
use rootscout::domain::correlator::{CorrelationParams, EventCorrelator};
use rootscout::domain::graph::ServiceGraph;
use rootscout::domain::policy::HealthPolicy;
use rootscout::domain::store::GraphStore;
use rootscout::domain::telemetry::{
    ChangeEvent, ChangeKind, FileChange, NormalizedTelemetryRecord, RecordKind, SpanStatus,
};

/// Fixed reference instant; fixtures are expressed as offsets from it.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    base_time() + TimeDelta::seconds(secs)
}

pub fn span(
    service: &str,
    caller: Option<&str>,
    span_id: &str,
    status: SpanStatus,
    secs: i64,
) -> NormalizedTelemetryRecord {
    NormalizedTelemetryRecord {
        kind: RecordKind::Span,
        trace_id: "trace-1".to_string(),
        span_id: span_id.to_string(),
        parent_span_id: None,
        service_name: service.to_string(),
        peer_service: caller.map(String::from),
        status,
        severity: None,
        timestamp: at(secs),
        latency_ms: Some(25.0),
        message: None,
    }
}

pub fn ok_call(caller: &str, callee: &str, span_id: &str, secs: i64) -> NormalizedTelemetryRecord {
    span(callee, Some(caller), span_id, SpanStatus::Ok, secs)
}

pub fn failed_call(
    caller: &str,
    callee: &str,
    span_id: &str,
    secs: i64,
) -> NormalizedTelemetryRecord {
    span(callee, Some(caller), span_id, SpanStatus::Error, secs)
}

/// Root span with no caller, failing.
pub fn failed_root(service: &str, span_id: &str, secs: i64) -> NormalizedTelemetryRecord {
    span(service, None, span_id, SpanStatus::Error, secs)
}

pub fn log(
    service: &str,
    span_id: &str,
    severity: &str,
    message: &str,
    secs: i64,
) -> NormalizedTelemetryRecord {
    NormalizedTelemetryRecord {
        kind: RecordKind::Log,
        trace_id: "trace-1".to_string(),
        span_id: span_id.to_string(),
        parent_span_id: None,
        service_name: service.to_string(),
        peer_service: None,
        status: SpanStatus::Ok,
        severity: Some(severity.to_string()),
        timestamp: at(secs),
        latency_ms: None,
        message: Some(message.to_string()),
    }
}

pub fn push(service: &str, sha: &str, timestamp: DateTime<Utc>) -> ChangeEvent {
    ChangeEvent {
        service_id: service.to_string(),
        event_type: ChangeKind::Push,
        commit_sha: Some(sha.to_string()),
        pr_number: None,
        files: vec![FileChange {
            filename: "src/handler.rs".to_string(),
            status: "modified".to_string(),
            additions: 12,
            deletions: 4,
            patch: None,
        }],
        timestamp,
    }
}

pub fn pull_request(
    service: &str,
    number: u64,
    sha: &str,
    timestamp: DateTime<Utc>,
) -> ChangeEvent {
    ChangeEvent {
        event_type: ChangeKind::PullRequest,
        pr_number: Some(number),
        ..push(service, sha, timestamp)
    }
}

/// Store with the given policy and timeline capacity.
pub fn store(error_threshold: usize, timeline_capacity: usize) -> GraphStore {
    GraphStore::new(ServiceGraph::new(
        HealthPolicy::new(error_threshold, true),
        timeline_capacity,
    ))
}

pub fn builder(store: &GraphStore) -> GraphBuilder {
    GraphBuilder::new(store.clone(), BuilderParams::default())
}

pub fn correlator(store: &GraphStore, lookback_hours: i64, cap: usize) -> EventCorrelator {
    EventCorrelator::new(
        store.clone(),
        CorrelationParams {
            lookback_hours,
            max_events_per_node: cap,
        },
    )
}
