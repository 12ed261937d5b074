use crate::domain::correlator::CorrelationParams;
use crate::domain::event::Event;
use crate::domain::graph::ServiceGraph;
use crate::domain::node::{Health, ServiceId};
use crate::domain::telemetry::ChangeEvent;
use crate::error::GraphError;
use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

/// Traversal bounds for fault isolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationParams {
    /// Downstream hops explored from the alerting service.
    pub max_hops: usize,
    /// Upstream hops gathered for blast-radius context.
    pub upstream_hops: usize,
    /// Timeline events copied per node into the packet.
    pub recent_events: usize,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            max_hops: 5,
            upstream_hops: 5,
            recent_events: 10,
        }
    }
}

/// How the candidate list was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// One or more error sinks were found.
    ErrorSink,
    /// Errors exist but every one is explained by another erroring callee
    /// (an error cycle); all erroring nodes are returned.
    ErrorCycle,
    /// Nothing downstream is in error; the alerting service is returned.
    NoErrorObserved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RootCauseCandidate {
    pub service: ServiceId,
    /// 1-based position in the ranking.
    pub rank: usize,
    /// Dense rank by hop distance; candidates at equal depth share a tier.
    pub confidence_rank: usize,
    pub hops: usize,
    pub health: Health,
    pub first_error_at: Option<DateTime<Utc>>,
    pub recent_events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeSnapshot {
    pub service: ServiceId,
    pub health: Health,
    pub version: Option<String>,
    pub hops: usize,
    pub recent_events: Vec<Event>,
}

/// Read-only snapshot handed to the reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContextPacket {
    pub target_service: ServiceId,
    pub target_health: Health,
    pub verdict: Verdict,
    pub candidates: Vec<RootCauseCandidate>,
    pub upstream: Vec<ServiceId>,
    pub downstream: Vec<ServiceId>,
    pub related: Vec<NodeSnapshot>,
    pub correlated_changes: Vec<ChangeEvent>,
    pub generated_at: DateTime<Utc>,
}

impl ContextPacket {
    pub fn top_candidate(&self) -> Option<&RootCauseCandidate> {
        self.candidates.first()
    }

    /// Correlated changes belonging to `service`, newest first.
    pub fn changes_for<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a ChangeEvent> {
        self.correlated_changes
            .iter()
            .filter(move |c| c.service_id == service)
    }
}

/// Fault isolator - narrows an alert down to ranked error sinks
pub struct FaultIsolator {
    params: IsolationParams,
    correlation: CorrelationParams,
}

impl Default for FaultIsolator {
    fn default() -> Self {
        Self::new(IsolationParams::default(), CorrelationParams::default())
    }
}

impl FaultIsolator {
    pub fn new(params: IsolationParams, correlation: CorrelationParams) -> Self {
        Self {
            params,
            correlation,
        }
    }

    pub fn params(&self) -> &IsolationParams {
        &self.params
    }

    /// Build the context packet for an alert on `service`.
    ///
    /// Unknown services are reported as `ServiceNotFound`; querying never
    /// creates nodes.
    pub fn get_context(
        &self,
        graph: &ServiceGraph,
        service: &str,
        now: DateTime<Utc>,
    ) -> Result<ContextPacket, GraphError> {
        let start = graph
            .index_of(service)
            .ok_or_else(|| GraphError::ServiceNotFound {
                service: service.to_string(),
            })?;

        let down = bounded_bfs(graph, start, Direction::Outgoing, self.params.max_hops);
        let up = bounded_bfs(graph, start, Direction::Incoming, self.params.upstream_hops);
        let (verdict, candidates) = self.rank_candidates(graph, start, &down);

        let related = down
            .iter()
            .map(|&(idx, hops)| {
                let node = graph.node(idx);
                NodeSnapshot {
                    service: node.service_id().to_string(),
                    health: node.health(),
                    version: node.version().map(String::from),
                    hops,
                    recent_events: node.timeline().recent(self.params.recent_events),
                }
            })
            .collect();

        let mut correlated_changes: Vec<ChangeEvent> = down
            .iter()
            .flat_map(|&(idx, _)| graph.node(idx).changes())
            .filter(|c| self.correlation.in_window(c.timestamp, now))
            .cloned()
            .collect();
        correlated_changes.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.service_id.cmp(&b.service_id))
        });

        let names = |visits: &[(NodeIndex, usize)]| -> Vec<ServiceId> {
            visits
                .iter()
                .skip(1)
                .map(|&(idx, _)| graph.node(idx).service_id().to_string())
                .collect()
        };

        Ok(ContextPacket {
            target_service: service.to_string(),
            target_health: graph.node(start).health(),
            verdict,
            candidates,
            upstream: names(&up[..]),
            downstream: names(&down[..]),
            related,
            correlated_changes,
            generated_at: now,
        })
    }

    /// Error sinks: erroring nodes none of whose traversed callees also error.
    fn rank_candidates(
        &self,
        graph: &ServiceGraph,
        start: NodeIndex,
        visits: &[(NodeIndex, usize)],
    ) -> (Verdict, Vec<RootCauseCandidate>) {
        let hops: HashMap<NodeIndex, usize> = visits.iter().copied().collect();
        let in_error = |idx: NodeIndex| graph.node(idx).health() == Health::Error;

        let errors: Vec<(NodeIndex, usize)> = visits
            .iter()
            .copied()
            .filter(|&(idx, _)| in_error(idx))
            .collect();

        let sinks: Vec<(NodeIndex, usize)> = errors
            .iter()
            .copied()
            .filter(|&(idx, _)| {
                !graph
                    .sorted_neighbors(idx, Direction::Outgoing)
                    .into_iter()
                    .any(|callee| hops.contains_key(&callee) && in_error(callee))
            })
            .collect();

        let (verdict, mut picked) = if !sinks.is_empty() {
            (Verdict::ErrorSink, sinks)
        } else if !errors.is_empty() {
            (Verdict::ErrorCycle, errors)
        } else {
            (Verdict::NoErrorObserved, vec![(start, 0)])
        };

        // Deeper first, then earliest error, then id for a stable order.
        picked.sort_by(|&(a, a_hops), &(b, b_hops)| {
            b_hops
                .cmp(&a_hops)
                .then_with(|| {
                    earliest_first(graph.node(a).first_error_at(), graph.node(b).first_error_at())
                })
                .then_with(|| graph.node(a).service_id().cmp(graph.node(b).service_id()))
        });

        let mut candidates = Vec::with_capacity(picked.len());
        let mut tier = 0;
        let mut last_hops = None;
        for (position, (idx, hops)) in picked.into_iter().enumerate() {
            if last_hops != Some(hops) {
                tier += 1;
                last_hops = Some(hops);
            }
            let node = graph.node(idx);
            candidates.push(RootCauseCandidate {
                service: node.service_id().to_string(),
                rank: position + 1,
                confidence_rank: tier,
                hops,
                health: node.health(),
                first_error_at: node.first_error_at(),
                recent_events: node.timeline().recent(self.params.recent_events),
            });
        }
        (verdict, candidates)
    }
}

/// Hop-bounded BFS from `start`, returning nodes in visit order with their
/// shortest hop distance. The start node is always first. The visited set
/// makes cycles terminate.
fn bounded_bfs(
    graph: &ServiceGraph,
    start: NodeIndex,
    direction: Direction,
    max_hops: usize,
) -> Vec<(NodeIndex, usize)> {
    let mut visited: HashMap<NodeIndex, usize> = HashMap::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    visited.insert(start, 0);
    queue.push_back((start, 0));

    while let Some((current, depth)) = queue.pop_front() {
        order.push((current, depth));
        if depth >= max_hops {
            continue;
        }
        for next in graph.sorted_neighbors(current, direction) {
            if visited.contains_key(&next) {
                continue;
            }
            visited.insert(next, depth + 1);
            queue.push_back((next, depth + 1));
        }
    }
    order
}

fn earliest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
