use crate::domain::isolator::ContextPacket;
use crate::domain::telemetry::{ChangeEvent, NormalizedTelemetryRecord};
use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Narrative verdict produced from a context packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IncidentReport {
    pub root_cause_service: String,
    /// Reasoner's own confidence in [0.0, 1.0].
    pub confidence: f32,
    pub reasoning: String,
    pub recommended_action: String,
    /// Change ids the reasoner holds responsible, if any.
    pub suspect_changes: Vec<String>,
}

/// Reasoning backend port (implemented by adapters, chosen by configuration)
pub trait Reasoner: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(&self, packet: &ContextPacket) -> Result<IncidentReport>;
}

/// Source of already-normalized telemetry and change events
pub trait RecordSource {
    fn telemetry(&self) -> Result<Vec<NormalizedTelemetryRecord>>;

    fn changes(&self) -> Result<Vec<ChangeEvent>>;
}
