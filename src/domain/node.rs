use crate::domain::event::Event;
use crate::domain::telemetry::ChangeEvent;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Service identifier (unique per node)
pub type ServiceId = String;

/// Health tag derived from a node's timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Ok,
    Warn,
    Error,
    #[default]
    Unknown,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Ok => "ok",
            Health::Warn => "warn",
            Health::Error => "error",
            Health::Unknown => "unknown",
        }
    }
}

/// Result of offering an event (or change) to a bounded history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    /// Same dedup key already present; nothing changed.
    Duplicate,
    /// History is full and the entry is older than everything retained.
    Expired,
}

impl RecordOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, RecordOutcome::Inserted)
    }
}

/// Time-ordered, size-bounded event history (oldest first, newest last).
#[derive(Debug, Clone)]
pub struct Timeline {
    events: VecDeque<Event>,
    keys: HashSet<String>,
    capacity: usize,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: Event) -> RecordOutcome {
        if self.keys.contains(&event.dedup_key) {
            return RecordOutcome::Duplicate;
        }
        if self.events.len() >= self.capacity
            && self
                .events
                .front()
                .is_some_and(|oldest| event.timestamp < oldest.timestamp)
        {
            return RecordOutcome::Expired;
        }

        // Late arrivals are slotted in by timestamp; in-order delivery hits the back.
        let pos = self
            .events
            .iter()
            .rposition(|e| e.timestamp <= event.timestamp)
            .map_or(0, |p| p + 1);
        self.keys.insert(event.dedup_key.clone());
        self.events.insert(pos, event);

        while self.events.len() > self.capacity {
            if let Some(evicted) = self.events.pop_front() {
                self.keys.remove(&evicted.dedup_key);
            }
        }
        RecordOutcome::Inserted
    }

    pub fn contains(&self, dedup_key: &str) -> bool {
        self.keys.contains(dedup_key)
    }

    /// Drop the event carrying `dedup_key`, if present.
    pub fn remove(&mut self, dedup_key: &str) -> bool {
        if !self.keys.remove(dedup_key) {
            return false;
        }
        if let Some(pos) = self.events.iter().position(|e| e.dedup_key == dedup_key) {
            self.events.remove(pos);
        }
        true
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Event> {
        self.events.iter()
    }

    /// The newest `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Event> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Service vertex.
///
/// Health is only ever written by reclassification inside the graph store,
/// so the field is not publicly mutable.
#[derive(Debug, Clone)]
pub struct ServiceNode {
    service_id: ServiceId,
    health: Health,
    version: Option<String>,
    timeline: Timeline,
    changes: VecDeque<ChangeEvent>,
    last_updated: Option<DateTime<Utc>>,
}

impl ServiceNode {
    pub fn new(service_id: impl Into<ServiceId>, timeline_capacity: usize) -> Self {
        Self {
            service_id: service_id.into(),
            health: Health::Unknown,
            version: None,
            timeline: Timeline::new(timeline_capacity),
            changes: VecDeque::new(),
            last_updated: None,
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Code changes attached to this service, oldest first.
    pub fn changes(&self) -> impl DoubleEndedIterator<Item = &ChangeEvent> {
        self.changes.iter()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Timestamp of the oldest error span still in the window.
    pub fn first_error_at(&self) -> Option<DateTime<Utc>> {
        self.timeline
            .iter()
            .find(|e| e.is_error_span())
            .map(|e| e.timestamp)
    }

    pub(crate) fn set_health(&mut self, health: Health) {
        self.health = health;
    }

    pub(crate) fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    pub(crate) fn push_event(&mut self, event: Event) -> RecordOutcome {
        let ts = event.timestamp;
        let outcome = self.timeline.push(event);
        if outcome.is_inserted() {
            self.touch(ts);
        }
        outcome
    }

    /// Attach a change to the ledger, evicting the oldest beyond `cap`.
    ///
    /// An evicted change takes its `code_change` timeline event with it, so
    /// the timeline never holds more change events than the ledger.
    pub(crate) fn attach_change(&mut self, change: ChangeEvent, cap: usize) -> RecordOutcome {
        let cap = cap.max(1);
        let id = change.change_id();
        if self.changes.iter().any(|c| c.change_id() == id) {
            return RecordOutcome::Duplicate;
        }
        if self.changes.len() >= cap
            && self
                .changes
                .front()
                .is_some_and(|oldest| change.timestamp < oldest.timestamp)
        {
            return RecordOutcome::Expired;
        }

        let ts = change.timestamp;
        let pos = self
            .changes
            .iter()
            .rposition(|c| c.timestamp <= change.timestamp)
            .map_or(0, |p| p + 1);
        self.changes.insert(pos, change);
        while self.changes.len() > cap {
            if let Some(evicted) = self.changes.pop_front() {
                self.timeline.remove(&evicted.timeline_key());
            }
        }
        self.touch(ts);
        RecordOutcome::Inserted
    }

    fn touch(&mut self, ts: DateTime<Utc>) {
        self.last_updated = Some(self.last_updated.map_or(ts, |prev| prev.max(ts)));
    }
}
