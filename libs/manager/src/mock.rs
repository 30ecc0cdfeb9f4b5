//! In-memory instance manager for tests and development.
//!
//! `MockManager` behaves like a well-behaved cloud backend: submitted
//! requests show up as pending capacity immediately, kill and cancel
//! report per-instance outcomes, and ownership is enforced. Failure
//! injection flags simulate unreachable providers, rejected bids, and
//! failing hooks.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use stratus_capacity::{
    CapacitySnapshot, Instance, InstanceId, InstanceState, LaunchConfiguration, WorkerClass,
    WorkerClassId,
};

use crate::{cheapest_by_unit_price, InstanceManager, InstanceOutcome, ManagerError, ManagerId};

#[derive(Debug, Default)]
struct ClassState {
    options: Vec<LaunchConfiguration>,
    instances: Vec<Instance>,
}

/// An in-memory cloud backend.
pub struct MockManager {
    id: ManagerId,
    classes: RwLock<HashMap<WorkerClassId, ClassState>>,

    /// When set, capacity queries and state updates fail with
    /// `ProviderUnavailable`.
    unavailable: AtomicBool,

    /// When set, only `update_internal_state` fails.
    fail_updates: AtomicBool,

    /// When set, `request_capacity` rejects every bid.
    fail_requests: AtomicBool,

    fail_pre_hook: AtomicBool,
    fail_post_hook: AtomicBool,

    /// Instances whose kill/cancel should fail, for mixed-outcome tests.
    doomed: Mutex<HashSet<InstanceId>>,

    /// Artificial latency for `update_internal_state`.
    update_delay: Mutex<Option<Duration>>,

    update_calls: AtomicU64,
}

impl MockManager {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ManagerId::new(id),
            classes: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_requests: AtomicBool::new(false),
            fail_pre_hook: AtomicBool::new(false),
            fail_post_hook: AtomicBool::new(false),
            doomed: Mutex::new(HashSet::new()),
            update_delay: Mutex::new(None),
            update_calls: AtomicU64::new(0),
        }
    }

    /// Registers a worker class this manager serves, with the launch
    /// configurations it offers for that class.
    ///
    /// Each configuration's payload is stamped with the class name so
    /// that `request_capacity` can route the purchase; payloads are
    /// produced and consumed by this same manager, per the contract.
    pub fn with_class(
        self,
        worker_class: impl Into<WorkerClassId>,
        options: Vec<LaunchConfiguration>,
    ) -> Self {
        let class_id = worker_class.into();
        let options = options
            .into_iter()
            .map(|config| stamp_class(config, &class_id))
            .collect();

        self.write_classes()
            .insert(class_id, ClassState { options, instances: Vec::new() });
        self
    }

    /// Seeds an instance as if the backend already reported it.
    pub fn add_instance(&self, worker_class: impl Into<WorkerClassId>, instance: Instance) {
        let class_id = worker_class.into();
        self.write_classes()
            .entry(class_id)
            .or_default()
            .instances
            .push(instance);
    }

    /// Flips every pending instance of a class to running, simulating
    /// the backend finishing boot between cycles.
    pub fn promote_pending(&self, worker_class: impl Into<WorkerClassId>) {
        let class_id = worker_class.into();
        if let Some(state) = self.write_classes().get_mut(&class_id) {
            for instance in &mut state.instances {
                instance.state = InstanceState::Running;
            }
        }
    }

    /// Snapshot of the instances currently tracked for a class.
    pub fn instances(&self, worker_class: impl Into<WorkerClassId>) -> Vec<Instance> {
        let class_id = worker_class.into();
        self.read_classes()
            .get(&class_id)
            .map(|state| state.instances.clone())
            .unwrap_or_default()
    }

    pub fn set_unavailable(&self, value: bool) {
        self.unavailable.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, value: bool) {
        self.fail_updates.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_requests(&self, value: bool) {
        self.fail_requests.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_pre_hook(&self, value: bool) {
        self.fail_pre_hook.store(value, Ordering::SeqCst);
    }

    pub fn set_fail_post_hook(&self, value: bool) {
        self.fail_post_hook.store(value, Ordering::SeqCst);
    }

    /// Marks an instance so that killing or cancelling it fails.
    pub fn doom_instance(&self, instance_id: InstanceId) {
        self.doomed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(instance_id);
    }

    pub fn set_update_delay(&self, delay: Duration) {
        *self
            .update_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// How many times `update_internal_state` has been called.
    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn read_classes(&self) -> std::sync::RwLockReadGuard<'_, HashMap<WorkerClassId, ClassState>> {
        self.classes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_classes(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<WorkerClassId, ClassState>> {
        self.classes.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(&self) -> Result<(), ManagerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ManagerError::ProviderUnavailable(format!(
                "{} is unreachable",
                self.id
            )));
        }
        Ok(())
    }

    fn remove_instances(
        &self,
        targets: &[Instance],
        expected_state: InstanceState,
    ) -> Vec<InstanceOutcome> {
        let doomed = self
            .doomed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut classes = self.write_classes();

        targets
            .iter()
            .map(|target| {
                let owner = classes
                    .values_mut()
                    .find(|state| state.instances.iter().any(|i| i.id == target.id));

                let Some(state) = owner else {
                    return InstanceOutcome::failed(
                        target.id,
                        ManagerError::ContractViolation(format!(
                            "instance {} is not owned by manager {}",
                            target.id, self.id
                        )),
                    );
                };

                if doomed.contains(&target.id) {
                    return InstanceOutcome::failed(
                        target.id,
                        ManagerError::Backend(format!("injected failure for {}", target.id)),
                    );
                }

                let position = state
                    .instances
                    .iter()
                    .position(|i| i.id == target.id && i.state == expected_state);

                match position {
                    Some(index) => {
                        state.instances.remove(index);
                        InstanceOutcome::ok(target.id)
                    }
                    None => InstanceOutcome::failed(
                        target.id,
                        ManagerError::ContractViolation(format!(
                            "instance {} is not in the {:?} state",
                            target.id, expected_state
                        )),
                    ),
                }
            })
            .collect()
    }
}

#[async_trait]
impl InstanceManager for MockManager {
    fn id(&self) -> &ManagerId {
        &self.id
    }

    fn supports(&self, worker_class: &WorkerClass) -> bool {
        self.read_classes().contains_key(&worker_class.id)
    }

    async fn current_capacity(
        &self,
        worker_class: &WorkerClass,
    ) -> Result<CapacitySnapshot, ManagerError> {
        self.check_reachable()?;

        let classes = self.read_classes();
        let mut snapshot = CapacitySnapshot::default();
        if let Some(state) = classes.get(&worker_class.id) {
            for instance in &state.instances {
                let units = worker_class
                    .capacity_units(&instance.instance_type)
                    .unwrap_or(0);
                match instance.state {
                    InstanceState::Running => snapshot.running_capacity += units,
                    InstanceState::Pending => snapshot.pending_capacity += units,
                }
            }
        }
        Ok(snapshot)
    }

    async fn launch_options(
        &self,
        worker_class: &WorkerClass,
    ) -> Result<Vec<LaunchConfiguration>, ManagerError> {
        self.check_reachable()?;
        Ok(self
            .read_classes()
            .get(&worker_class.id)
            .map(|state| state.options.clone())
            .unwrap_or_default())
    }

    async fn list_instances(
        &self,
        worker_class: &WorkerClass,
    ) -> Result<Vec<Instance>, ManagerError> {
        self.check_reachable()?;
        Ok(self
            .read_classes()
            .get(&worker_class.id)
            .map(|state| state.instances.clone())
            .unwrap_or_default())
    }

    async fn request_capacity(&self, config: &LaunchConfiguration) -> Result<(), ManagerError> {
        self.check_reachable()?;

        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(ManagerError::InvalidLaunchConfiguration(format!(
                "{} rejected bid for {}",
                self.id, config.instance_type
            )));
        }

        let class_id = config
            .payload
            .get("worker_class")
            .and_then(|v| v.as_str())
            .map(WorkerClassId::new)
            .ok_or_else(|| {
                ManagerError::ContractViolation(format!(
                    "launch configuration for {} was not produced by manager {}",
                    config.instance_type, self.id
                ))
            })?;

        let mut classes = self.write_classes();
        let Some(state) = classes.get_mut(&class_id) else {
            return Err(ManagerError::ContractViolation(format!(
                "manager {} does not serve worker class {}",
                self.id, class_id
            )));
        };

        let instance = Instance::pending(
            config.instance_type.clone(),
            serde_json::json!({ "requested_capacity": config.capacity }),
        );
        debug!(
            manager = %self.id,
            worker_class = %class_id,
            instance_id = %instance.id,
            instance_type = %config.instance_type,
            "[MOCK] Capacity requested"
        );
        state.instances.push(instance);
        Ok(())
    }

    async fn kill_instances(
        &self,
        instances: &[Instance],
    ) -> Result<Vec<InstanceOutcome>, ManagerError> {
        self.check_reachable()?;
        Ok(self.remove_instances(instances, InstanceState::Running))
    }

    async fn cancel_requests(
        &self,
        instances: &[Instance],
    ) -> Result<Vec<InstanceOutcome>, ManagerError> {
        self.check_reachable()?;
        Ok(self.remove_instances(instances, InstanceState::Pending))
    }

    fn cheapest_option<'a>(
        &self,
        options: &'a [LaunchConfiguration],
    ) -> Option<&'a LaunchConfiguration> {
        cheapest_by_unit_price(options)
    }

    async fn update_internal_state(&self) -> Result<(), ManagerError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self
            .update_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_reachable()?;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ManagerError::ProviderUnavailable(format!(
                "{} failed to refresh state",
                self.id
            )));
        }
        Ok(())
    }

    async fn pre_provisioning_hook(&self) -> Result<(), ManagerError> {
        if self.fail_pre_hook.load(Ordering::SeqCst) {
            return Err(ManagerError::Backend(format!(
                "{} pre-provisioning hook failed",
                self.id
            )));
        }
        Ok(())
    }

    async fn post_provisioning_hook(&self) -> Result<(), ManagerError> {
        if self.fail_post_hook.load(Ordering::SeqCst) {
            return Err(ManagerError::Backend(format!(
                "{} post-provisioning hook failed",
                self.id
            )));
        }
        Ok(())
    }
}

fn stamp_class(mut config: LaunchConfiguration, class_id: &WorkerClassId) -> LaunchConfiguration {
    let mut payload = match config.payload.take() {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    payload.insert(
        "worker_class".to_string(),
        serde_json::Value::String(class_id.to_string()),
    );
    config.payload = serde_json::Value::Object(payload);
    config
}
