use crate::domain::builder::IngestStats;
use crate::domain::correlator::CorrelationStats;
use crate::domain::isolator::ContextPacket;
use crate::domain::node::Health;
use crate::domain::ports::IncidentReport;
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextRequest {
    /// Service the alert fired on.
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeStatus {
    pub service: String,
    pub health: Health,
    pub version: Option<String>,
    pub event_count: usize,
    pub change_count: usize,
    /// Direct callees.
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes: Vec<NodeStatus>,
    pub ingest: IngestStats,
    pub correlation: CorrelationStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IngestResponse {
    /// Counts for this request only.
    pub batch: IngestStats,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChangesResponse {
    pub batch: CorrelationStats,
    pub node_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthzResponse {
    pub status: String,
    pub reasoner: String,
    pub node_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeResponse {
    pub report: IncidentReport,
    pub context: ContextPacket,
}
