//! Reasoner adapters
//!
//! Turn a context packet into an incident report. The backend is picked by
//! configuration; both shipped backends are local and deterministic.

mod heuristic;
mod passthrough;

pub use heuristic::HeuristicReasoner;
pub use passthrough::PassthroughReasoner;

use crate::domain::ports::Reasoner;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Selectable reasoning backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonerKind {
    #[default]
    Heuristic,
    Passthrough,
}

impl ReasonerKind {
    pub fn build(self) -> Arc<dyn Reasoner> {
        match self {
            ReasonerKind::Heuristic => Arc::new(HeuristicReasoner::default()),
            ReasonerKind::Passthrough => Arc::new(PassthroughReasoner),
        }
    }
}
