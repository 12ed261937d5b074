use crate::domain::event::EventStatus;
use crate::domain::node::{Health, Timeline};
use serde::{Deserialize, Serialize};

/// Health classification thresholds.
/// The trailing window is the node timeline itself (capacity K), not a time span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Error-status span events in the window needed to mark a node `error`.
    pub error_threshold: usize,
    /// When false, warn-status events never produce `warn`.
    pub warn_enabled: bool,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            error_threshold: 3,
            warn_enabled: true,
        }
    }
}

impl HealthPolicy {
    pub fn new(error_threshold: usize, warn_enabled: bool) -> Self {
        Self {
            error_threshold,
            warn_enabled,
        }
    }
}

/// Derive health from a timeline.
/// Order: error threshold → any warn → empty window (unknown) → ok.
pub fn classify(policy: &HealthPolicy, timeline: &Timeline) -> Health {
    let mut errors = 0usize;
    let mut warned = false;
    for event in timeline.iter() {
        if event.is_error_span() {
            errors += 1;
        }
        if event.status == EventStatus::Warn {
            warned = true;
        }
    }

    if errors >= policy.error_threshold.max(1) {
        Health::Error
    } else if policy.warn_enabled && warned {
        Health::Warn
    } else if timeline.is_empty() {
        Health::Unknown
    } else {
        Health::Ok
    }
}
