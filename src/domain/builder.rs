use crate::domain::event::{Event, EventKind, EventStatus};
use crate::domain::node::{RecordOutcome, ServiceId};
use crate::domain::store::GraphStore;
use crate::domain::telemetry::{NormalizedTelemetryRecord, RecordKind, SpanStatus};
use crate::error::IngestError;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Node that collects logs whose span could not be matched to a service.
pub const UNRESOLVED_SERVICE: &str = "unresolved";

/// Log messages are clipped to this many characters in event payloads.
const MAX_MESSAGE_CHARS: usize = 200;

/// Tuning knobs for telemetry ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderParams {
    /// An ok span at or above this latency is recorded as `warn`.
    pub slow_span_ms: f64,
    /// Span id → service entries kept for caller and log resolution. Also
    /// bounds the child spans waiting on a parent that has not arrived yet.
    pub span_index_capacity: usize,
}

impl Default for BuilderParams {
    fn default() -> Self {
        Self {
            slow_span_ms: 1500.0,
            span_index_capacity: 10_000,
        }
    }
}

/// Running ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IngestStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub expired: u64,
    pub rejected: u64,
}

/// What happened to a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Recorded {
        service: ServiceId,
        caller: Option<ServiceId>,
    },
    Duplicate,
    /// Older than everything in an already full timeline.
    Expired,
}

/// How a span's caller was resolved at ingest time.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallerLink {
    Known(ServiceId),
    /// Parent span not indexed yet; the edge is added once it is.
    Awaiting(String),
    Root,
}

/// Child span parked until its parent span shows up.
#[derive(Debug, Clone)]
struct WaitingChild {
    span_id: String,
    service: ServiceId,
    seen_at: DateTime<Utc>,
}

/// Bounded FIFO map of span id → owning service, plus the children waiting
/// on spans not seen yet.
struct SpanIndex {
    by_span: HashMap<String, ServiceId>,
    order: VecDeque<String>,
    capacity: usize,
    waiting: HashMap<String, Vec<WaitingChild>>,
    waiting_order: VecDeque<String>,
    waiting_len: usize,
}

impl SpanIndex {
    fn new(capacity: usize) -> Self {
        Self {
            by_span: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            waiting: HashMap::new(),
            waiting_order: VecDeque::new(),
            waiting_len: 0,
        }
    }

    fn get(&self, span_id: &str) -> Option<&ServiceId> {
        self.by_span.get(span_id)
    }

    fn insert(&mut self, span_id: &str, service: &str) {
        if self.by_span.contains_key(span_id) {
            return;
        }
        self.by_span.insert(span_id.to_string(), service.to_string());
        self.order.push_back(span_id.to_string());
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.by_span.remove(&old);
            }
        }
    }

    /// Caller order: explicit peer, then the owner of the parent span; a caller
    /// equal to the callee is an intra-service hop and yields no edge.
    fn caller_of(&self, record: &NormalizedTelemetryRecord, service: &str) -> CallerLink {
        if let Some(peer) = record.explicit_caller() {
            return CallerLink::Known(peer.to_string());
        }
        let Some(parent) = record.parent_span() else {
            return CallerLink::Root;
        };
        match self.get(parent) {
            Some(owner) if owner.as_str() != service => CallerLink::Known(owner.clone()),
            Some(_) => CallerLink::Root,
            None => CallerLink::Awaiting(parent.to_string()),
        }
    }

    /// Park `child` under `parent`, evicting the oldest parents beyond capacity.
    fn park(&mut self, parent: &str, child: WaitingChild) {
        match self.waiting.get_mut(parent) {
            Some(children) => {
                if children.iter().any(|c| c.span_id == child.span_id) {
                    return;
                }
                children.push(child);
            }
            None => {
                self.waiting.insert(parent.to_string(), vec![child]);
                self.waiting_order.push_back(parent.to_string());
            }
        }
        self.waiting_len += 1;
        while self.waiting_len > self.capacity {
            let Some(oldest) = self.waiting_order.pop_front() else {
                break;
            };
            if let Some(dropped) = self.waiting.remove(&oldest) {
                self.waiting_len -= dropped.len();
                debug!(
                    parent = %oldest,
                    children = dropped.len(),
                    "dropped children of unseen span"
                );
            }
        }
    }

    fn take_children(&mut self, span_id: &str) -> Vec<WaitingChild> {
        let Some(children) = self.waiting.remove(span_id) else {
            return Vec::new();
        };
        self.waiting_len -= children.len();
        // Drained parents linger in the FIFO; compact once they dominate it.
        if self.waiting_order.len() > 2 * self.capacity {
            let waiting = &self.waiting;
            self.waiting_order.retain(|parent| waiting.contains_key(parent));
        }
        children
    }
}

/// Graph builder - turns normalized telemetry into graph mutations
///
/// Duplicate delivery is absorbed by store idempotence. A child span that
/// arrives before its parent is parked and gets its caller edge when the
/// parent is indexed.
pub struct GraphBuilder {
    store: GraphStore,
    params: BuilderParams,
    span_index: Mutex<SpanIndex>,
    accepted: AtomicU64,
    duplicates: AtomicU64,
    expired: AtomicU64,
    rejected: AtomicU64,
}

impl GraphBuilder {
    pub fn new(store: GraphStore, params: BuilderParams) -> Self {
        let span_index = Mutex::new(SpanIndex::new(params.span_index_capacity));
        Self {
            store,
            params,
            span_index,
            accepted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Ingest one record. Malformed records are counted, logged and rejected
    /// before they reach the store.
    pub fn ingest(
        &self,
        record: &NormalizedTelemetryRecord,
    ) -> Result<IngestOutcome, IngestError> {
        let result = self.route(record);
        let counter = match &result {
            Ok(IngestOutcome::Recorded { .. }) => &self.accepted,
            Ok(IngestOutcome::Duplicate) => &self.duplicates,
            Ok(IngestOutcome::Expired) => &self.expired,
            Err(e) => {
                warn!(error = %e, trace_id = %record.trace_id, "rejected telemetry record");
                &self.rejected
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Ingest a batch, continuing past rejected records.
    pub fn ingest_batch(&self, records: &[NormalizedTelemetryRecord]) -> IngestStats {
        let mut stats = IngestStats::default();
        for record in records {
            match self.ingest(record) {
                Ok(IngestOutcome::Recorded { .. }) => stats.accepted += 1,
                Ok(IngestOutcome::Duplicate) => stats.duplicates += 1,
                Ok(IngestOutcome::Expired) => stats.expired += 1,
                Err(_) => stats.rejected += 1,
            }
        }
        stats
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn route(&self, record: &NormalizedTelemetryRecord) -> Result<IngestOutcome, IngestError> {
        let service = record.service_name.trim();
        if service.is_empty() {
            return Err(IngestError::MissingService { kind: record.kind });
        }
        match record.kind {
            RecordKind::Span => self.ingest_span(record, service),
            RecordKind::Log => Ok(self.ingest_log(record, service)),
        }
    }

    fn ingest_span(
        &self,
        record: &NormalizedTelemetryRecord,
        service: &str,
    ) -> Result<IngestOutcome, IngestError> {
        let span_id = record.span_id.trim();
        if span_id.is_empty() {
            return Err(IngestError::MissingSpanId {
                service: service.to_string(),
            });
        }

        // Lock order: span index, then store.
        let mut index = self.lock_index();
        let link = index.caller_of(record, service);
        let event = Event {
            kind: EventKind::Span {
                trace_id: record.trace_id.clone(),
                span_id: span_id.to_string(),
                latency_ms: record.latency_ms,
                error: record.status == SpanStatus::Error,
            },
            timestamp: record.timestamp,
            status: self.span_status(record),
            dedup_key: format!("span:{span_id}"),
            payload: record.message.as_deref().map(clip),
        };

        let mut graph = self.store.write();
        let outcome = graph.record_event(service, event);
        if outcome != RecordOutcome::Duplicate {
            match &link {
                CallerLink::Known(caller) => {
                    if let Err(e) = graph.upsert_edge(caller, service, record.timestamp) {
                        debug!(error = %e, "edge skipped");
                    }
                }
                CallerLink::Awaiting(parent) => {
                    debug!(service, span_id, parent = %parent, "parent span not seen yet");
                    index.park(
                        parent,
                        WaitingChild {
                            span_id: span_id.to_string(),
                            service: service.to_string(),
                            seen_at: record.timestamp,
                        },
                    );
                }
                CallerLink::Root => {}
            }
        }

        index.insert(span_id, service);
        for child in index.take_children(span_id) {
            if child.service == service {
                continue;
            }
            match graph.upsert_edge(service, &child.service, child.seen_at) {
                Ok(_) => {
                    debug!(caller = service, callee = %child.service, "resolved waiting child span")
                }
                Err(e) => debug!(error = %e, "edge skipped"),
            }
        }
        drop(graph);
        drop(index);

        Ok(match outcome {
            RecordOutcome::Inserted => IngestOutcome::Recorded {
                service: service.to_string(),
                caller: match link {
                    CallerLink::Known(caller) => Some(caller),
                    CallerLink::Awaiting(_) | CallerLink::Root => None,
                },
            },
            RecordOutcome::Duplicate => IngestOutcome::Duplicate,
            RecordOutcome::Expired => IngestOutcome::Expired,
        })
    }

    fn ingest_log(&self, record: &NormalizedTelemetryRecord, service: &str) -> IngestOutcome {
        let span_id = record.span_id.trim();
        let owner = if span_id.is_empty() {
            None
        } else {
            self.lock_index().get(span_id).cloned()
        };
        let target = owner.unwrap_or_else(|| {
            debug!(service, span_id, "log has no matching span; filing as unresolved");
            UNRESOLVED_SERVICE.to_string()
        });

        let status = match record.severity.as_deref() {
            Some(severity) => EventStatus::from_severity(severity),
            None if record.status == SpanStatus::Error => EventStatus::Error,
            None => EventStatus::Ok,
        };
        let message = record.message.as_deref().unwrap_or_default();
        let event = Event {
            kind: EventKind::Log {
                trace_id: record.trace_id.clone(),
                span_id: span_id.to_string(),
                severity: record.severity.clone(),
            },
            timestamp: record.timestamp,
            status,
            dedup_key: log_dedup_key(record, service, message),
            payload: Some(clip(&format!("{service}: {message}"))),
        };

        match self.store.write().record_event(&target, event) {
            RecordOutcome::Inserted => IngestOutcome::Recorded {
                service: target,
                caller: None,
            },
            RecordOutcome::Duplicate => IngestOutcome::Duplicate,
            RecordOutcome::Expired => IngestOutcome::Expired,
        }
    }

    fn span_status(&self, record: &NormalizedTelemetryRecord) -> EventStatus {
        match record.status {
            SpanStatus::Error => EventStatus::Error,
            SpanStatus::Ok
                if record
                    .latency_ms
                    .is_some_and(|ms| ms >= self.params.slow_span_ms) =>
            {
                EventStatus::Warn
            }
            SpanStatus::Ok => EventStatus::Ok,
        }
    }

    fn lock_index(&self) -> std::sync::MutexGuard<'_, SpanIndex> {
        self.span_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_dedup_key(record: &NormalizedTelemetryRecord, service: &str, message: &str) -> String {
    let mut hasher = DefaultHasher::new();
    service.hash(&mut hasher);
    message.hash(&mut hasher);
    format!(
        "log:{}:{}:{}:{:016x}",
        record.trace_id,
        record.span_id.trim(),
        record.timestamp.timestamp_nanos_opt().unwrap_or_default(),
        hasher.finish()
    )
}

fn clip(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::Health;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_770_000_000 + secs, 0).unwrap()
    }

    fn span(service: &str, span_id: &str, parent: Option<&str>) -> NormalizedTelemetryRecord {
        NormalizedTelemetryRecord {
            kind: RecordKind::Span,
            trace_id: "trace-1".into(),
            span_id: span_id.into(),
            parent_span_id: parent.map(String::from),
            service_name: service.into(),
            peer_service: None,
            status: SpanStatus::Ok,
            severity: None,
            timestamp: at(0),
            latency_ms: Some(20.0),
            message: None,
        }
    }

    fn builder() -> GraphBuilder {
        GraphBuilder::new(GraphStore::default(), BuilderParams::default())
    }

    #[test]
    fn test_parent_span_resolves_caller() {
        let b = builder();
        b.ingest(&span("frontend", "s1", None)).unwrap();
        let outcome = b.ingest(&span("checkout", "s2", Some("s1"))).unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Recorded {
                service: "checkout".into(),
                caller: Some("frontend".into())
            }
        );
        assert!(b.store().read().edge("frontend", "checkout").is_some());
    }

    #[test]
    fn test_intra_service_parent_creates_no_edge() {
        let b = builder();
        b.ingest(&span("cart", "s1", None)).unwrap();
        b.ingest(&span("cart", "s2", Some("s1"))).unwrap();
        assert_eq!(b.store().read().edge_count(), 0);
    }

    #[test]
    fn test_peer_service_wins_over_parent() {
        let b = builder();
        b.ingest(&span("frontend", "s1", None)).unwrap();
        let mut rec = span("payment", "s2", Some("s1"));
        rec.peer_service = Some("checkout".into());
        b.ingest(&rec).unwrap();
        let g = b.store().read();
        assert!(g.edge("checkout", "payment").is_some());
        assert!(g.edge("frontend", "payment").is_none());
    }

    #[test]
    fn test_slow_ok_span_marks_warn() {
        let b = builder();
        let mut rec = span("search", "s1", None);
        rec.latency_ms = Some(2_000.0);
        b.ingest(&rec).unwrap();
        assert_eq!(b.store().read().get_node("search").unwrap().health(), Health::Warn);
    }

    #[test]
    fn test_missing_span_id_rejected() {
        let b = builder();
        let rec = span("search", "  ", None);
        assert!(matches!(
            b.ingest(&rec),
            Err(IngestError::MissingSpanId { .. })
        ));
        assert_eq!(b.stats().rejected, 1);
        assert_eq!(b.store().read().node_count(), 0);
    }

    #[test]
    fn test_child_before_parent_gets_caller_edge() {
        let b = builder();
        let child = span("checkout", "s2", Some("s1"));
        assert_eq!(
            b.ingest(&child).unwrap(),
            IngestOutcome::Recorded {
                service: "checkout".into(),
                caller: None
            }
        );
        assert_eq!(b.store().read().edge_count(), 0);

        b.ingest(&span("frontend", "s1", None)).unwrap();
        assert_eq!(
            b.store()
                .read()
                .edge("frontend", "checkout")
                .map(|e| e.call_count),
            Some(1)
        );

        // Redelivering either span leaves the edge alone.
        assert_eq!(b.ingest(&child).unwrap(), IngestOutcome::Duplicate);
        b.ingest(&span("frontend", "s1", None)).unwrap();
        let g = b.store().read();
        assert_eq!(g.edge("frontend", "checkout").map(|e| e.call_count), Some(1));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_waiting_children_are_bounded() {
        let mut index = SpanIndex::new(2);
        for (parent, child) in [("p1", "c1"), ("p2", "c2"), ("p3", "c3")] {
            index.park(
                parent,
                WaitingChild {
                    span_id: child.into(),
                    service: "svc".into(),
                    seen_at: at(0),
                },
            );
        }
        assert!(index.take_children("p1").is_empty());
        assert_eq!(index.take_children("p3").len(), 1);
        assert_eq!(index.waiting_len, 1);
    }

    #[test]
    fn test_span_index_is_bounded() {
        let mut index = SpanIndex::new(2);
        index.insert("a", "x");
        index.insert("b", "y");
        index.insert("c", "z");
        assert!(index.get("a").is_none());
        assert_eq!(index.get("c").map(String::as_str), Some("z"));
    }

    #[test]
    fn test_clip_counts_chars() {
        let long = "é".repeat(500);
        assert_eq!(clip(&long).chars().count(), MAX_MESSAGE_CHARS);
    }
}
