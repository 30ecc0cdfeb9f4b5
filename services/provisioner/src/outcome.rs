//! Structured per-cycle results.
//!
//! `iterate()` never throws for isolated failures; everything that went
//! right or wrong inside a cycle lands here, per manager and per worker
//! class, serializable for logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use stratus_capacity::WorkerClassId;
use stratus_manager::ManagerId;

/// How one manager fared in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ManagerStatus {
    /// Updated its state and participated in the cycle.
    Ready,

    /// `update_internal_state` failed; the manager sat the cycle out.
    UpdateFailed(String),

    /// The pre-provisioning hook failed; the manager sat the cycle out.
    PreHookFailed(String),
}

/// Per-manager cycle report.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerReport {
    pub manager: ManagerId,
    pub status: ManagerStatus,

    /// Set when the post-provisioning hook failed. Housekeeping only,
    /// does not retract the manager's participation.
    pub post_hook_error: Option<String>,
}

impl ManagerReport {
    /// Whether this manager takes part in capacity decisions this cycle.
    pub fn participating(&self) -> bool {
        self.status == ManagerStatus::Ready
    }
}

/// Counts for one reconciled worker class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    /// Capacity delta the cycle decided on: positive creates, negative
    /// destroys, zero no-op.
    pub delta: i64,

    pub bids_submitted: usize,
    pub bids_failed: usize,

    /// Instances successfully killed or cancelled.
    pub instances_removed: usize,
    pub kills_failed: usize,
}

/// How one worker class fared in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassStatus {
    /// The class was reconciled; bids/kills were dispatched as counted.
    Reconciled(ClassStats),

    /// The class was deferred to the next cycle (invalid config, an
    /// unavailable eligible manager, or no eligible manager at all).
    Skipped { reason: String },

    /// Planning or submission failed outright for this class.
    Failed { error: String },
}

/// Per-worker-class cycle report.
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub worker_class: WorkerClassId,
    #[serde(flatten)]
    pub status: ClassStatus,
}

impl ClassReport {
    pub fn stats(&self) -> Option<&ClassStats> {
        match &self.status {
            ClassStatus::Reconciled(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Result of one full `iterate()` cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// The cycle ran past its deadline. In-flight provider calls were
    /// still allowed to finish; this flag is observability only.
    pub timed_out: bool,

    pub managers: Vec<ManagerReport>,
    pub classes: Vec<ClassReport>,
}

impl CycleOutcome {
    /// Report for a single worker class, by ID.
    pub fn class(&self, worker_class: &WorkerClassId) -> Option<&ClassReport> {
        self.classes.iter().find(|c| &c.worker_class == worker_class)
    }

    /// Report for a single manager, by ID.
    pub fn manager(&self, manager: &ManagerId) -> Option<&ManagerReport> {
        self.managers.iter().find(|m| &m.manager == manager)
    }

    /// Total bids successfully submitted across all classes.
    pub fn bids_submitted(&self) -> usize {
        self.classes
            .iter()
            .filter_map(|c| c.stats())
            .map(|s| s.bids_submitted)
            .sum()
    }

    /// Total instances removed (killed or cancelled) across all classes.
    pub fn instances_removed(&self) -> usize {
        self.classes
            .iter()
            .filter_map(|c| c.stats())
            .map(|s| s.instances_removed)
            .sum()
    }

    /// True when every class reconciled and no bid or kill failed.
    pub fn fully_reconciled(&self) -> bool {
        self.classes.iter().all(|c| match &c.status {
            ClassStatus::Reconciled(stats) => stats.bids_failed == 0 && stats.kills_failed == 0,
            _ => false,
        })
    }
}
