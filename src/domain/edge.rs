use chrono::{DateTime, Utc};

/// Directed call relationship: source calls target.
///
/// At most one edge exists per ordered pair; repeated observations bump
/// `call_count` instead of adding parallel edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEdge {
    pub call_count: u64,
    pub last_seen: DateTime<Utc>,
}

impl CallEdge {
    pub fn new(seen_at: DateTime<Utc>) -> Self {
        Self {
            call_count: 1,
            last_seen: seen_at,
        }
    }

    pub fn observe(&mut self, seen_at: DateTime<Utc>) {
        self.call_count += 1;
        self.last_seen = self.last_seen.max(seen_at);
    }
}
