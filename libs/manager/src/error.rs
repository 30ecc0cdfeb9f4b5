//! Error types for instance manager operations.

use thiserror::Error;

/// Errors an instance manager can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// The backend cannot be reached. Transient: this manager's
    /// contribution is skipped for the cycle and retried next cycle,
    /// never substituted with zero capacity.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The caller broke the contract, e.g. a kill referencing an
    /// instance this manager never reported. Fatal to the cycle; must
    /// not be silently swallowed.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A launch configuration was rejected by the backend.
    #[error("invalid launch configuration: {0}")]
    InvalidLaunchConfiguration(String),

    /// Backend-specific failure that is neither transient unreachability
    /// nor a contract problem.
    #[error("backend error: {0}")]
    Backend(String),
}

impl ManagerError {
    /// Whether this error must abort the whole cycle rather than being
    /// aggregated into the cycle's outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ManagerError::ContractViolation(_))
    }
}
