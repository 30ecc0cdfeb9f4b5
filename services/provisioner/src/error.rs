//! Error types for the reconciliation loop.
//!
//! The propagation policy is strict: per-manager and per-worker-class
//! failures are aggregated into the cycle's [`CycleOutcome`] and never
//! raised; only orchestration-level failures and contract violations
//! abort `iterate()`.
//!
//! [`CycleOutcome`]: crate::outcome::CycleOutcome

use stratus_capacity::{ConfigError, WorkerClassId};
use stratus_manager::ManagerError;
use thiserror::Error;

/// Failures that abort an entire reconciliation cycle.
#[derive(Debug, Error, Clone)]
pub enum CycleError {
    /// Worker class configuration could not be loaded at all. There is
    /// nothing to reconcile without it.
    #[error("failed to load worker classes: {0}")]
    Orchestration(String),

    /// A manager reported a contract violation, e.g. a kill routed to a
    /// manager that never reported the instance. Indicates a bug and is
    /// never swallowed into the cycle outcome.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// `try_iterate` was called while another cycle held the
    /// single-flight guard.
    #[error("a reconciliation cycle is already in progress")]
    CycleInProgress,
}

/// Failures scoped to one worker class within a cycle.
///
/// These never abort the cycle; the class is reported as skipped or
/// failed and its siblings proceed.
#[derive(Debug, Error, Clone)]
pub enum ClassError {
    /// The worker class configuration violates its invariants.
    #[error("invalid worker class configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// An eligible manager is unreachable or was skipped this cycle.
    /// The class is deferred rather than reconciled against a partial
    /// view, so a missing backend is never mistaken for zero capacity.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No configured manager can provide capacity for this class.
    #[error("no instance manager supports worker class {0}")]
    NoEligibleManagers(WorkerClassId),

    /// Capacity needs to be created but no manager offers a usable
    /// launch configuration.
    #[error("no launch options offered for worker class {0}")]
    NoLaunchOptions(WorkerClassId),

    /// The pending-task count source failed for this class.
    #[error("pending task count unavailable: {0}")]
    QueueUnavailable(String),

    /// A manager operation failed in a way that is neither transient
    /// unreachability nor a contract violation.
    #[error(transparent)]
    Manager(ManagerError),
}

impl ClassError {
    /// Whether the class was skipped (deferred to the next cycle) as
    /// opposed to actively failing.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ClassError::Configuration(_)
                | ClassError::ProviderUnavailable(_)
                | ClassError::NoEligibleManagers(_)
        )
    }
}

impl From<ManagerError> for ClassError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::ProviderUnavailable(msg) => ClassError::ProviderUnavailable(msg),
            other => ClassError::Manager(other),
        }
    }
}
