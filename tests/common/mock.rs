//! Mock implementations for integration tests.
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use rootscout::domain::isolator::ContextPacket;
use rootscout::domain::ports::{IncidentReport, Reasoner, RecordSource};
use rootscout::domain::telemetry::{ChangeEvent, NormalizedTelemetryRecord};
use std::sync::Mutex;

/// In-memory RecordSource.
#[derive(Default)]
pub struct MemorySource {
    pub records: Vec<NormalizedTelemetryRecord>,
    pub changes: Vec<ChangeEvent>,
}

impl MemorySource {
    pub fn new(records: Vec<NormalizedTelemetryRecord>, changes: Vec<ChangeEvent>) -> Self {
        Self { records, changes }
    }
}

impl RecordSource for MemorySource {
    fn telemetry(&self) -> Result<Vec<NormalizedTelemetryRecord>> {
        Ok(self.records.clone())
    }

    fn changes(&self) -> Result<Vec<ChangeEvent>> {
        Ok(self.changes.clone())
    }
}

/// Reasoner that records every packet it sees and blames a fixed service.
pub struct RecordingReasoner {
    pub blame: String,
    pub seen: Mutex<Vec<ContextPacket>>,
}

impl RecordingReasoner {
    pub fn new(blame: &str) -> Self {
        Self {
            blame: blame.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Reasoner for RecordingReasoner {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn analyze(&self, packet: &ContextPacket) -> Result<IncidentReport> {
        self.seen
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(packet.clone());
        Ok(IncidentReport {
            root_cause_service: self.blame.clone(),
            confidence: 0.5,
            reasoning: "fixed".to_string(),
            recommended_action: "none".to_string(),
            suspect_changes: Vec::new(),
        })
    }
}

/// Reasoner whose backend is always unavailable.
pub struct FailingReasoner;

impl Reasoner for FailingReasoner {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn analyze(&self, _packet: &ContextPacket) -> Result<IncidentReport> {
        Err(anyhow!("backend unavailable"))
    }
}
