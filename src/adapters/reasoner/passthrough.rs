use crate::domain::isolator::ContextPacket;
use crate::domain::ports::{IncidentReport, Reasoner};
use anyhow::{Result, anyhow};

/// Reports the isolator's ranking as-is, without looking at changes.
pub struct PassthroughReasoner;

impl Reasoner for PassthroughReasoner {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn analyze(&self, packet: &ContextPacket) -> Result<IncidentReport> {
        let top = packet.top_candidate().ok_or_else(|| {
            anyhow!(
                "context packet for '{}' has no candidates",
                packet.target_service
            )
        })?;

        let ranking = packet
            .candidates
            .iter()
            .map(|c| format!("{}. {} ({} hops)", c.rank, c.service, c.hops))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(IncidentReport {
            root_cause_service: top.service.clone(),
            confidence: 1.0 / top.confidence_rank.max(1) as f32,
            reasoning: format!("Ranked candidates: {ranking}"),
            recommended_action: format!("Investigate '{}'.", top.service),
            suspect_changes: Vec::new(),
        })
    }
}
