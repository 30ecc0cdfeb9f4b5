//! # stratus-manager
//!
//! The instance manager capability contract.
//!
//! An [`InstanceManager`] represents one cloud backend: all of EC2, all of
//! DigitalOcean, and so on. Subdivisions of a cloud (regions, zones) are
//! handled inside the implementing type. The provisioner treats every
//! backend uniformly through this trait and never calls provider APIs
//! directly.
//!
//! ## Contract
//!
//! - All async operations may involve network I/O and must be safe to
//!   invoke concurrently; the provisioner queries the same manager for
//!   several worker classes at once. Each manager serializes its own
//!   internal bookkeeping.
//! - `current_capacity` must reflect requests submitted through
//!   `request_capacity` before the backend confirms them. Backends are
//!   eventually consistent; without this bookkeeping the provisioner
//!   would double-count across cycles and over-bid.
//! - Kill and cancel operations report an outcome per instance, never one
//!   aggregate result.

mod error;
pub mod mock;

pub use error::ManagerError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratus_capacity::{CapacitySnapshot, Instance, InstanceId, LaunchConfiguration, WorkerClass};

/// Name of an instance manager, e.g. `"ec2"` or `"digitalocean"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagerId(String);

impl ManagerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ManagerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ManagerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Outcome of killing or cancelling one instance.
///
/// Kill and cancel are best-effort: a mix of success and failure across
/// one batch is valid and must be reported per element.
#[derive(Debug, Clone)]
pub struct InstanceOutcome {
    pub instance_id: InstanceId,
    pub outcome: Result<(), ManagerError>,
}

impl InstanceOutcome {
    pub fn ok(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            outcome: Ok(()),
        }
    }

    pub fn failed(instance_id: InstanceId, error: ManagerError) -> Self {
        Self {
            instance_id,
            outcome: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Capability contract implemented once per cloud backend.
#[async_trait]
pub trait InstanceManager: Send + Sync {
    /// Stable name of this manager, used for routing and reporting.
    fn id(&self) -> &ManagerId;

    /// Whether this manager can provide capacity for the given worker
    /// class. Decides which classes a manager participates in, and
    /// therefore which classes must be skipped when it is unavailable.
    fn supports(&self, worker_class: &WorkerClass) -> bool;

    /// Current capacity counts for a worker class, in capacity units.
    ///
    /// Must include in-flight requests submitted via `request_capacity`
    /// even before the backend confirms them. Fails with
    /// [`ManagerError::ProviderUnavailable`] when the backend cannot be
    /// reached; callers must not substitute a stale value on that path.
    async fn current_capacity(
        &self,
        worker_class: &WorkerClass,
    ) -> Result<CapacitySnapshot, ManagerError>;

    /// Launch configurations this manager currently offers for a worker
    /// class. The provisioner bids against these; payloads come back to
    /// this same manager via `request_capacity`.
    async fn launch_options(
        &self,
        worker_class: &WorkerClass,
    ) -> Result<Vec<LaunchConfiguration>, ManagerError>;

    /// Instances this manager currently reports for a worker class.
    /// Kill and cancel targets must be drawn from this list.
    async fn list_instances(
        &self,
        worker_class: &WorkerClass,
    ) -> Result<Vec<Instance>, ManagerError>;

    /// Initiates creation of one unit of the given launch configuration.
    ///
    /// Any state needed to track the request across eventual-consistency
    /// windows is this manager's responsibility and must be reflected in
    /// `current_capacity` immediately.
    async fn request_capacity(&self, config: &LaunchConfiguration) -> Result<(), ManagerError>;

    /// Best-effort termination of running instances, one outcome each.
    async fn kill_instances(
        &self,
        instances: &[Instance],
    ) -> Result<Vec<InstanceOutcome>, ManagerError>;

    /// Best-effort cancellation of not-yet-running requests, one outcome
    /// each.
    async fn cancel_requests(
        &self,
        instances: &[Instance],
    ) -> Result<Vec<InstanceOutcome>, ManagerError>;

    /// Picks the cheapest of the given configurations.
    ///
    /// Pure and deterministic: lowest unit price wins, ties broken by
    /// first occurrence in the input. Implementations that have no
    /// special pricing logic delegate to [`cheapest_by_unit_price`].
    fn cheapest_option<'a>(
        &self,
        options: &'a [LaunchConfiguration],
    ) -> Option<&'a LaunchConfiguration>;

    /// Synchronizes internal bookkeeping with the backend's authoritative
    /// state. Called once at the start of each cycle; `current_capacity`
    /// answers are only trusted after this completes.
    async fn update_internal_state(&self) -> Result<(), ManagerError>;

    /// Housekeeping before provisioning choices are made. A failure here
    /// removes only this manager from the current cycle.
    async fn pre_provisioning_hook(&self) -> Result<(), ManagerError> {
        Ok(())
    }

    /// Housekeeping after provisioning choices are dispatched. Failures
    /// are isolated to this manager.
    async fn post_provisioning_hook(&self) -> Result<(), ManagerError> {
        Ok(())
    }
}

/// Stable lowest-price selection: first occurrence wins ties.
///
/// `Iterator::min_by_key` keeps the *last* minimum, so this walks the
/// slice keeping the first strictly-cheaper element.
pub fn cheapest_by_unit_price(
    options: &[LaunchConfiguration],
) -> Option<&LaunchConfiguration> {
    let mut cheapest: Option<&LaunchConfiguration> = None;
    for option in options {
        match cheapest {
            Some(current) if option.unit_price >= current.unit_price => {}
            _ => cheapest = Some(option),
        }
    }
    cheapest
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::lowest_price_wins(vec![("a", 5), ("b", 3), ("c", 4)], Some("b"))]
    // Prices [5, 3, 3]: the first config priced 3 wins.
    #[case::first_of_tied_prices_wins(vec![("a", 5), ("b", 3), ("c", 3)], Some("b"))]
    #[case::empty_input(vec![], None)]
    fn test_cheapest_selection(
        #[case] priced: Vec<(&str, u64)>,
        #[case] expected: Option<&str>,
    ) {
        let options: Vec<LaunchConfiguration> = priced
            .into_iter()
            .map(|(instance_type, price)| LaunchConfiguration::new(instance_type, 2, price))
            .collect();
        let picked = cheapest_by_unit_price(&options).map(|c| c.instance_type.as_str());
        assert_eq!(picked, expected);
    }
}
