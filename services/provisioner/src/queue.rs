//! Pending-work count source.
//!
//! The provisioner never looks at work items themselves; it only needs a
//! count per worker class. The real source (a task queue service) lives
//! outside this crate and is injected at construction.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use stratus_capacity::WorkerClassId;

/// Source of pending-work counts per worker class.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Number of work items currently waiting for the given class.
    async fn pending_tasks(&self, worker_class: &WorkerClassId) -> Result<u64>;
}

/// Fixed in-memory counts, for tests and the dev harness.
#[derive(Debug, Default)]
pub struct StaticQueue {
    counts: RwLock<HashMap<WorkerClassId, u64>>,
}

impl StaticQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, worker_class: impl Into<WorkerClassId>, count: u64) {
        self.counts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(worker_class.into(), count);
    }
}

#[async_trait]
impl WorkQueue for StaticQueue {
    async fn pending_tasks(&self, worker_class: &WorkerClassId) -> Result<u64> {
        Ok(self
            .counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(worker_class)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_queue_defaults_to_zero() {
        let queue = StaticQueue::new();
        queue.set("builds", 7);

        let builds = WorkerClassId::new("builds");
        let tests = WorkerClassId::new("tests");
        assert_eq!(queue.pending_tasks(&builds).await.unwrap(), 7);
        assert_eq!(queue.pending_tasks(&tests).await.unwrap(), 0);
    }
}
