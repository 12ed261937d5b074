use crate::domain::isolator::{ContextPacket, Verdict};
use crate::domain::ports::{IncidentReport, Reasoner};
use anyhow::{Result, bail};

/// Rule-based reasoner
/// Blames the top-ranked candidate and raises confidence when a recent
/// change landed on it.
pub struct HeuristicReasoner {
    with_change: f32,
    without_change: f32,
    no_error: f32,
}

impl Default for HeuristicReasoner {
    fn default() -> Self {
        Self::new(0.9, 0.6, 0.1)
    }
}

impl HeuristicReasoner {
    pub fn new(with_change: f32, without_change: f32, no_error: f32) -> Self {
        Self {
            with_change,
            without_change,
            no_error,
        }
    }
}

impl Reasoner for HeuristicReasoner {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn analyze(&self, packet: &ContextPacket) -> Result<IncidentReport> {
        let Some(top) = packet.top_candidate() else {
            bail!("context packet for '{}' has no candidates", packet.target_service);
        };

        if packet.verdict == Verdict::NoErrorObserved {
            return Ok(IncidentReport {
                root_cause_service: top.service.clone(),
                confidence: self.no_error,
                reasoning: format!(
                    "None of the {} services downstream of '{}' is in error.",
                    packet.downstream.len(),
                    packet.target_service
                ),
                recommended_action: format!(
                    "Escalate: the alert on '{}' is not explained by the call graph.",
                    packet.target_service
                ),
                suspect_changes: Vec::new(),
            });
        }

        let mut reasoning = match packet.verdict {
            Verdict::ErrorCycle => format!(
                "Errors form a cycle; '{}' is the deepest erroring service ({} hops from '{}').",
                top.service, top.hops, packet.target_service
            ),
            _ => format!(
                "'{}' is an error sink {} hops from '{}' and none of its callees are failing.",
                top.service, top.hops, packet.target_service
            ),
        };
        if packet.candidates.len() > 1 {
            reasoning.push_str(&format!(
                " {} other candidates were found.",
                packet.candidates.len() - 1
            ));
        }

        // Newest change first.
        let suspects: Vec<_> = packet.changes_for(&top.service).collect();
        let Some(latest) = suspects.first() else {
            return Ok(IncidentReport {
                root_cause_service: top.service.clone(),
                confidence: self.without_change,
                reasoning,
                recommended_action: format!(
                    "Inspect recent errors and dependencies of '{}'.",
                    top.service
                ),
                suspect_changes: Vec::new(),
            });
        };

        reasoning.push_str(&format!(" Recent change: {}.", latest.summary()));
        Ok(IncidentReport {
            root_cause_service: top.service.clone(),
            confidence: self.with_change,
            reasoning,
            recommended_action: format!(
                "Roll back {} on '{}'.",
                latest.change_id(),
                top.service
            ),
            suspect_changes: suspects.iter().map(|c| c.change_id()).collect(),
        })
    }
}
