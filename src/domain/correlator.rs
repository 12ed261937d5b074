use crate::domain::event::{Event, EventKind, EventStatus};
use crate::domain::node::RecordOutcome;
use crate::domain::store::GraphStore;
use crate::domain::telemetry::{ChangeEvent, ChangeKind};
use chrono::{DateTime, TimeDelta, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Recency window and per-node cap for attached change events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationParams {
    pub lookback_hours: i64,
    pub max_events_per_node: usize,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            lookback_hours: 168,
            max_events_per_node: 25,
        }
    }
}

impl CorrelationParams {
    pub fn lookback(&self) -> TimeDelta {
        TimeDelta::try_hours(self.lookback_hours).unwrap_or(TimeDelta::MAX)
    }

    /// Oldest timestamp still inside the window ending at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.lookback())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn in_window(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        ts >= self.cutoff(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationOutcome {
    Attached,
    /// Older than the lookback window.
    Stale,
    Duplicate,
    /// Ledger is full and the change predates everything retained.
    Expired,
    /// No service identifier to match on.
    Unmatched,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CorrelationStats {
    pub attached: u64,
    pub stale: u64,
    pub duplicates: u64,
    pub expired: u64,
    pub unmatched: u64,
}

impl CorrelationStats {
    fn add(&mut self, outcome: CorrelationOutcome) {
        match outcome {
            CorrelationOutcome::Attached => self.attached += 1,
            CorrelationOutcome::Stale => self.stale += 1,
            CorrelationOutcome::Duplicate => self.duplicates += 1,
            CorrelationOutcome::Expired => self.expired += 1,
            CorrelationOutcome::Unmatched => self.unmatched += 1,
        }
    }
}

/// Merges external code-change events into node timelines.
///
/// Each accepted change lands twice: as a `code_change` timeline event and as
/// a full record in the node's change ledger (capped independently of the
/// timeline). Pushes with a commit also retag the node version.
pub struct EventCorrelator {
    store: GraphStore,
    params: CorrelationParams,
    counters: [AtomicU64; 5],
}

impl EventCorrelator {
    pub fn new(store: GraphStore, params: CorrelationParams) -> Self {
        Self {
            store,
            params,
            counters: Default::default(),
        }
    }

    pub fn params(&self) -> &CorrelationParams {
        &self.params
    }

    pub fn correlate(&self, change: &ChangeEvent, now: DateTime<Utc>) -> CorrelationOutcome {
        let outcome = self.attach(change, now);
        self.counters[slot(outcome)].fetch_add(1, Ordering::Relaxed);
        outcome
    }

    pub fn correlate_batch(&self, changes: &[ChangeEvent], now: DateTime<Utc>) -> CorrelationStats {
        let mut stats = CorrelationStats::default();
        for change in changes {
            stats.add(self.correlate(change, now));
        }
        stats
    }

    pub fn stats(&self) -> CorrelationStats {
        let load = |outcome| self.counters[slot(outcome)].load(Ordering::Relaxed);
        CorrelationStats {
            attached: load(CorrelationOutcome::Attached),
            stale: load(CorrelationOutcome::Stale),
            duplicates: load(CorrelationOutcome::Duplicate),
            expired: load(CorrelationOutcome::Expired),
            unmatched: load(CorrelationOutcome::Unmatched),
        }
    }

    fn attach(&self, change: &ChangeEvent, now: DateTime<Utc>) -> CorrelationOutcome {
        let service = change.service_id.trim();
        if service.is_empty() {
            warn!(change_id = %change.change_id(), "change event without service id");
            return CorrelationOutcome::Unmatched;
        }
        if !self.params.in_window(change.timestamp, now) {
            debug!(service, change_id = %change.change_id(), "change outside lookback window");
            return CorrelationOutcome::Stale;
        }

        let change_id = change.change_id();
        let mut graph = self.store.write();
        match graph.attach_change(service, change.clone(), self.params.max_events_per_node) {
            RecordOutcome::Duplicate => return CorrelationOutcome::Duplicate,
            RecordOutcome::Expired => return CorrelationOutcome::Expired,
            RecordOutcome::Inserted => {}
        }

        let event = Event {
            kind: EventKind::CodeChange {
                change_id: change_id.clone(),
                commit_sha: change.commit_sha.clone(),
                pr_number: change.pr_number,
                files_changed: change.files.len(),
            },
            timestamp: change.timestamp,
            status: EventStatus::Ok,
            dedup_key: change.timeline_key(),
            payload: Some(change.summary()),
        };
        graph.record_event(service, event);

        if change.event_type == ChangeKind::Push
            && let Some(sha) = change.commit_sha.as_deref()
        {
            graph.tag_version(service, sha);
        }
        debug!(service, change_id = %change_id, "change correlated");
        CorrelationOutcome::Attached
    }
}

fn slot(outcome: CorrelationOutcome) -> usize {
    match outcome {
        CorrelationOutcome::Attached => 0,
        CorrelationOutcome::Stale => 1,
        CorrelationOutcome::Duplicate => 2,
        CorrelationOutcome::Expired => 3,
        CorrelationOutcome::Unmatched => 4,
    }
}
