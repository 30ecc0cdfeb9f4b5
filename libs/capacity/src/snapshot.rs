//! Per-manager capacity snapshots.

use serde::{Deserialize, Serialize};

/// Capacity counts for one (instance manager, worker class) pair.
///
/// Counts are in capacity units, not instances. Snapshots from several
/// managers are summed into a per-worker-class total; the provisioner
/// only ever derives totals this way, it never mutates them directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    /// Units currently able to take work.
    pub running_capacity: u64,

    /// Units requested but not yet running, including requests the
    /// backend has not confirmed yet.
    pub pending_capacity: u64,
}

impl CapacitySnapshot {
    pub const fn new(running_capacity: u64, pending_capacity: u64) -> Self {
        Self {
            running_capacity,
            pending_capacity,
        }
    }

    /// Running plus pending units. Saturates rather than overflowing on
    /// pathological manager reports.
    pub const fn total(&self) -> u64 {
        self.running_capacity.saturating_add(self.pending_capacity)
    }

    /// Adds another manager's snapshot into this one, saturating.
    pub fn absorb(&mut self, other: CapacitySnapshot) {
        self.running_capacity = self.running_capacity.saturating_add(other.running_capacity);
        self.pending_capacity = self.pending_capacity.saturating_add(other.pending_capacity);
    }
}
