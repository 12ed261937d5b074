use crate::app::dto::*;
use crate::config::RootScoutConfig;
use crate::domain::builder::{GraphBuilder, IngestOutcome};
use crate::domain::correlator::{CorrelationOutcome, EventCorrelator};
use crate::domain::graph::ServiceGraph;
use crate::domain::isolator::{ContextPacket, FaultIsolator};
use crate::domain::ports::Reasoner;
use crate::domain::store::GraphStore;
use crate::domain::telemetry::{ChangeEvent, NormalizedTelemetryRecord};
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Shared handle over the graph and the components that feed and query it.
/// Cloning is cheap; all clones see the same graph.
#[derive(Clone)]
pub struct RootScoutEngine {
    inner: Arc<EngineData>,
}

struct EngineData {
    store: GraphStore,
    builder: GraphBuilder,
    correlator: EventCorrelator,
    isolator: FaultIsolator,
    reasoner: Arc<dyn Reasoner>,
}

impl RootScoutEngine {
    pub fn from_config(config: &RootScoutConfig) -> Self {
        let graph = ServiceGraph::new(config.health.clone(), config.graph.timeline_capacity);
        Self::from_parts(
            GraphStore::new(graph),
            config,
            config.reasoner.kind.build(),
        )
    }

    /// Construct an engine over an existing store with a caller-supplied reasoner.
    pub fn from_parts(
        store: GraphStore,
        config: &RootScoutConfig,
        reasoner: Arc<dyn Reasoner>,
    ) -> Self {
        info!(reasoner = reasoner.name(), "engine initialised");
        Self {
            inner: Arc::new(EngineData {
                builder: GraphBuilder::new(store.clone(), config.graph.builder_params()),
                correlator: EventCorrelator::new(store.clone(), config.correlation.clone()),
                isolator: FaultIsolator::new(
                    config.isolation.clone(),
                    config.correlation.clone(),
                ),
                store,
                reasoner,
            }),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.inner.store
    }

    pub fn reasoner_name(&self) -> &'static str {
        self.inner.reasoner.name()
    }

    pub fn ingest_record(&self, record: &NormalizedTelemetryRecord) -> Result<IngestOutcome> {
        Ok(self.inner.builder.ingest(record)?)
    }

    pub fn ingest_records(&self, records: &[NormalizedTelemetryRecord]) -> IngestResponse {
        let batch = self.inner.builder.ingest_batch(records);
        let graph = self.inner.store.read();
        IngestResponse {
            batch,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
        }
    }

    pub fn ingest_change(&self, change: &ChangeEvent) -> CorrelationOutcome {
        self.inner.correlator.correlate(change, Utc::now())
    }

    pub fn ingest_changes(&self, changes: &[ChangeEvent]) -> ChangesResponse {
        self.ingest_changes_at(changes, Utc::now())
    }

    /// Correlate changes against a window ending at `now` (used for replays).
    pub fn ingest_changes_at(
        &self,
        changes: &[ChangeEvent],
        now: DateTime<Utc>,
    ) -> ChangesResponse {
        let batch = self.inner.correlator.correlate_batch(changes, now);
        ChangesResponse {
            batch,
            node_count: self.inner.store.read().node_count(),
        }
    }

    pub fn get_context(&self, service: &str) -> Result<ContextPacket> {
        self.get_context_at(service, Utc::now())
    }

    pub fn get_context_at(&self, service: &str, now: DateTime<Utc>) -> Result<ContextPacket> {
        let graph = self.inner.store.read();
        Ok(self.inner.isolator.get_context(&graph, service, now)?)
    }

    pub fn analyze(&self, service: &str) -> Result<AnalyzeResponse> {
        self.analyze_at(service, Utc::now())
    }

    pub fn analyze_at(&self, service: &str, now: DateTime<Utc>) -> Result<AnalyzeResponse> {
        let context = self.get_context_at(service, now)?;
        let report = self
            .inner
            .reasoner
            .analyze(&context)
            .with_context(|| format!("Reasoner '{}' failed", self.inner.reasoner.name()))?;
        Ok(AnalyzeResponse { report, context })
    }

    pub fn status(&self) -> StatusResponse {
        let graph = self.inner.store.read();
        let nodes = graph
            .nodes()
            .into_iter()
            .map(|node| NodeStatus {
                service: node.service_id().to_string(),
                health: node.health(),
                version: node.version().map(String::from),
                event_count: node.timeline().len(),
                change_count: node.changes().count(),
                dependencies: graph
                    .neighbors_out(node.service_id())
                    .map(|callees| callees.into_iter().map(String::from).collect())
                    .unwrap_or_default(),
            })
            .collect();

        StatusResponse {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            nodes,
            ingest: self.inner.builder.stats(),
            correlation: self.inner.correlator.stats(),
        }
    }

    pub fn healthz(&self) -> HealthzResponse {
        HealthzResponse {
            status: "ok".to_string(),
            reasoner: self.reasoner_name().to_string(),
            node_count: self.inner.store.read().node_count(),
        }
    }
}
