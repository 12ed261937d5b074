use crate::domain::edge::CallEdge;
use crate::domain::event::Event;
use crate::domain::node::{RecordOutcome, ServiceId, ServiceNode};
use crate::domain::policy::{HealthPolicy, classify};
use crate::domain::telemetry::ChangeEvent;
use crate::error::GraphError;
use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use std::collections::HashMap;
use tracing::debug;

/// Default timeline capacity (K) when none is configured
pub const DEFAULT_TIMELINE_CAPACITY: usize = 50;

/// Service dependency graph - the core data structure
///
/// The petgraph storage stays private so the id index cannot drift from it:
///
/// ```compile_fail
/// let g = rootscout::domain::graph::ServiceGraph::default();
/// let _ = g.graph.node_count();
/// ```
pub struct ServiceGraph {
    /// Directed call graph: an edge `a -> b` means `a` calls `b`
    graph: DiGraph<ServiceNode, CallEdge>,

    /// Mapping from service id to node index
    service_to_node: HashMap<ServiceId, NodeIndex>,

    policy: HealthPolicy,
    timeline_capacity: usize,
}

impl Default for ServiceGraph {
    fn default() -> Self {
        Self::new(HealthPolicy::default(), DEFAULT_TIMELINE_CAPACITY)
    }
}

impl ServiceGraph {
    pub fn new(policy: HealthPolicy, timeline_capacity: usize) -> Self {
        Self {
            graph: DiGraph::new(),
            service_to_node: HashMap::new(),
            policy,
            timeline_capacity: timeline_capacity.max(1),
        }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Return the node for `id`, creating it on first reference.
    pub fn upsert_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.service_to_node.get(id) {
            return idx;
        }
        let idx = self
            .graph
            .add_node(ServiceNode::new(id, self.timeline_capacity));
        self.service_to_node.insert(id.to_string(), idx);
        debug!(service = id, "created service node");
        idx
    }

    /// Record one observation of `source` calling `target`.
    pub fn upsert_edge(
        &mut self,
        source: &str,
        target: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<EdgeIndex, GraphError> {
        if source == target {
            return Err(GraphError::SelfLoop {
                service: source.to_string(),
            });
        }
        let s = self.upsert_node(source);
        let t = self.upsert_node(target);
        if let Some(edge) = self.graph.find_edge(s, t) {
            self.graph[edge].observe(seen_at);
            return Ok(edge);
        }
        debug!(source, target, "new dependency edge");
        Ok(self.graph.add_edge(s, t, CallEdge::new(seen_at)))
    }

    /// Append an event to a node's timeline and reclassify it.
    /// A duplicate dedup key is a silent no-op.
    pub fn record_event(&mut self, id: &str, event: Event) -> RecordOutcome {
        let idx = self.upsert_node(id);
        let node = &mut self.graph[idx];
        let outcome = node.push_event(event);
        if outcome.is_inserted() {
            let health = classify(&self.policy, node.timeline());
            node.set_health(health);
        }
        outcome
    }

    /// Attach a full change event to the node's change ledger.
    /// Evicting a change also evicts its timeline event, so health is recomputed.
    pub fn attach_change(&mut self, id: &str, change: ChangeEvent, cap: usize) -> RecordOutcome {
        let idx = self.upsert_node(id);
        let node = &mut self.graph[idx];
        let outcome = node.attach_change(change, cap);
        if outcome.is_inserted() {
            let health = classify(&self.policy, node.timeline());
            node.set_health(health);
        }
        outcome
    }

    /// Version tag, last write wins.
    pub fn tag_version(&mut self, id: &str, version: &str) {
        let idx = self.upsert_node(id);
        self.graph[idx].set_version(version);
    }

    pub fn get_node(&self, id: &str) -> Result<&ServiceNode, GraphError> {
        self.index_of(id)
            .map(|idx| &self.graph[idx])
            .ok_or_else(|| GraphError::ServiceNotFound {
                service: id.to_string(),
            })
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.service_to_node.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ServiceNode {
        &self.graph[idx]
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&CallEdge> {
        let s = self.index_of(source)?;
        let t = self.index_of(target)?;
        self.graph.find_edge(s, t).map(|e| &self.graph[e])
    }

    /// Services called by `id`, sorted by id.
    pub fn neighbors_out(&self, id: &str) -> Result<Vec<&str>, GraphError> {
        self.neighbor_ids(id, Direction::Outgoing)
    }

    /// Services calling `id`, sorted by id.
    pub fn neighbors_in(&self, id: &str) -> Result<Vec<&str>, GraphError> {
        self.neighbor_ids(id, Direction::Incoming)
    }

    /// Neighbor indices sorted by service id so traversals are deterministic.
    pub(crate) fn sorted_neighbors(&self, idx: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        neighbors.sort_by(|a, b| self.graph[*a].service_id().cmp(self.graph[*b].service_id()));
        neighbors.dedup();
        neighbors
    }

    fn neighbor_ids(&self, id: &str, dir: Direction) -> Result<Vec<&str>, GraphError> {
        let idx = self.index_of(id).ok_or_else(|| GraphError::ServiceNotFound {
            service: id.to_string(),
        })?;
        Ok(self
            .sorted_neighbors(idx, dir)
            .into_iter()
            .map(|n| self.graph[n].service_id())
            .collect())
    }

    /// All nodes, sorted by service id.
    pub fn nodes(&self) -> Vec<&ServiceNode> {
        let mut nodes: Vec<&ServiceNode> = self.graph.node_weights().collect();
        nodes.sort_by(|a, b| a.service_id().cmp(b.service_id()));
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
