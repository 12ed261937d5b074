use crate::domain::graph::ServiceGraph;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle to the live service graph.
///
/// A single coarse lock serializes mutations; readers share the lock and
/// therefore never observe a half-applied event. Every mutation completes
/// under one guard, so a poisoned lock still holds a consistent graph and is
/// recovered rather than propagated.
#[derive(Clone, Default)]
pub struct GraphStore {
    inner: Arc<RwLock<ServiceGraph>>,
}

impl GraphStore {
    pub fn new(graph: ServiceGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ServiceGraph> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ServiceGraph> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
