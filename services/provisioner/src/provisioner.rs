//! The reconciliation loop.
//!
//! One `iterate()` call is one cycle:
//!
//! 1. Refresh every instance manager's internal state (concurrent, a
//!    failure skips only that manager for the cycle).
//! 2. Run pre-provisioning hooks (same isolation).
//! 3. Load worker classes (failure aborts the cycle).
//! 4. Plan every worker class independently and concurrently: compute
//!    the capacity delta, turn it into bids or kills.
//! 5. Dispatch all bids and kills, concurrently and independently;
//!    failures are collected, never raised.
//! 6. Run post-provisioning hooks (isolated).
//!
//! At most one cycle runs at a time per provisioner. Overlapping cycles
//! would see each other's in-flight requests twice and over-bid, so
//! `iterate` queues behind the single-flight guard and `try_iterate`
//! rejects instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use stratus_capacity::{CapacitySnapshot, Instance, LaunchConfiguration, WorkerClass};
use stratus_manager::{InstanceManager, ManagerError, ManagerId};

use crate::error::{ClassError, CycleError};
use crate::outcome::{
    ClassReport, ClassStats, ClassStatus, CycleOutcome, ManagerReport, ManagerStatus,
};
use crate::queue::WorkQueue;
use crate::store::WorkerClassStore;

/// A request to create capacity: one purchase of one launch
/// configuration against the manager that offered it.
#[derive(Clone)]
pub struct Bid {
    pub manager: Arc<dyn InstanceManager>,
    pub config: LaunchConfiguration,
}

impl std::fmt::Debug for Bid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bid")
            .field("manager", self.manager.id())
            .field("config", &self.config)
            .finish()
    }
}

/// A request to remove capacity: instances to cancel or terminate,
/// routed to the manager that reported them. Batches are built
/// per-manager, so a kill never references a foreign instance.
#[derive(Clone)]
pub struct Kill {
    pub manager: Arc<dyn InstanceManager>,
    pub instances: Vec<Instance>,
}

impl std::fmt::Debug for Kill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kill")
            .field("manager", self.manager.id())
            .field("instances", &self.instances.len())
            .finish()
    }
}

/// Result of dispatching one [`Kill`] batch.
#[derive(Debug, Clone)]
pub struct KillDispatch {
    pub manager: ManagerId,
    pub removed: usize,
    pub failed: usize,

    /// Set when the manager reported a contract violation. Escalated to
    /// a cycle abort rather than aggregated.
    pub contract_violation: Option<String>,
}

/// Raw capacity delta for one worker class.
///
/// Desired capacity is the pending-task count scaled by the class's
/// ratio, clamped into its [min, max] bounds; the delta is whatever
/// separates the observed total from that. Pending capacity offsets
/// demand because every pending instance will eventually absorb work.
pub fn compute_delta(
    pending_tasks: u64,
    totals: CapacitySnapshot,
    worker_class: &WorkerClass,
) -> i64 {
    let desired = (pending_tasks as f64 * worker_class.scaling_ratio).ceil() as u64;
    let desired = desired.clamp(worker_class.min_capacity, worker_class.max_capacity);
    // Bounds and supply are u64 but the delta is signed; saturate
    // instead of truncating when a config or manager reports counts
    // beyond i64::MAX.
    let desired = i64::try_from(desired).unwrap_or(i64::MAX);
    let supply = i64::try_from(totals.total()).unwrap_or(i64::MAX);
    desired - supply
}

struct PlannedActions {
    delta: i64,
    bids: Vec<Bid>,
    kills: Vec<Kill>,
}

/// The autoscaling control loop.
///
/// Collaborators are injected: the work queue, the worker class store,
/// and one [`InstanceManager`] per cloud backend. The provisioner holds
/// no lock over provider state; each manager serializes its own
/// bookkeeping.
pub struct Provisioner {
    id: String,
    managers: Vec<Arc<dyn InstanceManager>>,
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn WorkerClassStore>,
    deadline: Option<Duration>,
    cycle_guard: Mutex<()>,
}

impl Provisioner {
    pub fn new(
        id: impl Into<String>,
        managers: Vec<Arc<dyn InstanceManager>>,
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn WorkerClassStore>,
    ) -> Self {
        Self {
            id: id.into(),
            managers,
            queue,
            store,
            deadline: None,
            cycle_guard: Mutex::new(()),
        }
    }

    /// Marks cycles running longer than `deadline` as timed out in their
    /// outcome. Provider calls are never interrupted mid-flight; a
    /// partially applied manager operation could leave inconsistent
    /// provider-side state.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Runs one reconciliation cycle, queueing behind any cycle already
    /// in flight.
    #[instrument(skip(self), fields(provisioner = %self.id))]
    pub async fn iterate(&self) -> Result<CycleOutcome, CycleError> {
        let _guard = self.cycle_guard.lock().await;
        self.run_cycle().await
    }

    /// Runs one reconciliation cycle, rejecting with
    /// [`CycleError::CycleInProgress`] if one is already in flight.
    #[instrument(skip(self), fields(provisioner = %self.id))]
    pub async fn try_iterate(&self) -> Result<CycleOutcome, CycleError> {
        let _guard = self
            .cycle_guard
            .try_lock()
            .map_err(|_| CycleError::CycleInProgress)?;
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();
        let started_at = Utc::now();

        // Step 1: refresh every manager's bookkeeping. Capacity answers
        // are not trusted until this has completed per manager.
        let updates = join_all(
            self.managers
                .iter()
                .map(|manager| manager.update_internal_state()),
        )
        .await;

        let mut manager_reports: Vec<ManagerReport> = self
            .managers
            .iter()
            .zip(updates)
            .map(|(manager, result)| {
                let status = match result {
                    Ok(()) => ManagerStatus::Ready,
                    Err(e) => {
                        warn!(
                            manager = %manager.id(),
                            error = %e,
                            "State update failed, manager sits this cycle out"
                        );
                        ManagerStatus::UpdateFailed(e.to_string())
                    }
                };
                ManagerReport {
                    manager: manager.id().clone(),
                    status,
                    post_hook_error: None,
                }
            })
            .collect();

        // Step 2: pre-provisioning hooks for managers still in play.
        let pre_results = join_all(self.managers.iter().zip(&manager_reports).map(
            |(manager, report)| async move {
                if report.participating() {
                    Some(manager.pre_provisioning_hook().await)
                } else {
                    None
                }
            },
        ))
        .await;

        for (report, result) in manager_reports.iter_mut().zip(pre_results) {
            if let Some(Err(e)) = result {
                warn!(
                    manager = %report.manager,
                    error = %e,
                    "Pre-provisioning hook failed, manager sits this cycle out"
                );
                report.status = ManagerStatus::PreHookFailed(e.to_string());
            }
        }

        let (active, skipped): (Vec<_>, Vec<_>) = self
            .managers
            .iter()
            .cloned()
            .zip(&manager_reports)
            .partition(|(_, report)| report.participating());
        let active: Vec<Arc<dyn InstanceManager>> = active.into_iter().map(|(m, _)| m).collect();
        let skipped: Vec<Arc<dyn InstanceManager>> = skipped.into_iter().map(|(m, _)| m).collect();

        // Step 3: without worker classes there is nothing to reconcile.
        let worker_classes = self
            .store
            .load_worker_classes()
            .await
            .map_err(|e| CycleError::Orchestration(e.to_string()))?;

        // Step 4: plan every class independently.
        let plans = join_all(
            worker_classes
                .iter()
                .map(|worker_class| self.plan_worker_class(worker_class, &active, &skipped)),
        )
        .await;

        // Step 5: dispatch everything that was planned. Each class's
        // bids and kills go out concurrently with everyone else's.
        let dispatches = join_all(worker_classes.iter().zip(plans).map(
            |(worker_class, plan)| async move {
                let report = match plan {
                    Ok(actions) => {
                        let (bid_results, kill_dispatches) = tokio::join!(
                            self.submit_bids(&actions.bids),
                            self.submit_kills(&actions.kills),
                        );

                        if let Some(fatal) = first_contract_violation(&bid_results, &kill_dispatches)
                        {
                            return Err(CycleError::ContractViolation(fatal));
                        }

                        let mut stats = ClassStats {
                            delta: actions.delta,
                            ..Default::default()
                        };
                        for result in &bid_results {
                            match result {
                                Ok(()) => stats.bids_submitted += 1,
                                Err(_) => stats.bids_failed += 1,
                            }
                        }
                        for dispatch in &kill_dispatches {
                            stats.instances_removed += dispatch.removed;
                            stats.kills_failed += dispatch.failed;
                        }
                        ClassStatus::Reconciled(stats)
                    }
                    Err(e) if e.is_skip() => {
                        info!(
                            worker_class = %worker_class.id,
                            reason = %e,
                            "Worker class skipped this cycle"
                        );
                        ClassStatus::Skipped {
                            reason: e.to_string(),
                        }
                    }
                    Err(e) => {
                        warn!(
                            worker_class = %worker_class.id,
                            error = %e,
                            "Failed to reconcile worker class"
                        );
                        ClassStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };

                Ok(ClassReport {
                    worker_class: worker_class.id.clone(),
                    status: report,
                })
            },
        ))
        .await;

        let classes = dispatches
            .into_iter()
            .collect::<Result<Vec<_>, CycleError>>()?;

        // Step 6: post-provisioning hooks for managers that took part.
        let post_results = join_all(self.managers.iter().zip(&manager_reports).map(
            |(manager, report)| async move {
                if report.participating() {
                    Some(manager.post_provisioning_hook().await)
                } else {
                    None
                }
            },
        ))
        .await;

        for (report, result) in manager_reports.iter_mut().zip(post_results) {
            if let Some(Err(e)) = result {
                warn!(manager = %report.manager, error = %e, "Post-provisioning hook failed");
                report.post_hook_error = Some(e.to_string());
            }
        }

        let timed_out = self.deadline.is_some_and(|d| started.elapsed() > d);
        if timed_out {
            warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Reconciliation cycle exceeded its deadline"
            );
        }

        let outcome = CycleOutcome {
            started_at,
            finished_at: Utc::now(),
            timed_out,
            managers: manager_reports,
            classes,
        };

        info!(
            classes = outcome.classes.len(),
            bids_submitted = outcome.bids_submitted(),
            instances_removed = outcome.instances_removed(),
            fully_reconciled = outcome.fully_reconciled(),
            "Reconciliation cycle complete"
        );

        Ok(outcome)
    }

    async fn plan_worker_class(
        &self,
        worker_class: &WorkerClass,
        active: &[Arc<dyn InstanceManager>],
        skipped: &[Arc<dyn InstanceManager>],
    ) -> Result<PlannedActions, ClassError> {
        worker_class.validate()?;

        // A class served by an unavailable manager is deferred whole: a
        // partial capacity view would read as missing capacity and
        // trigger phantom scale-up.
        if let Some(manager) = skipped.iter().find(|m| m.supports(worker_class)) {
            return Err(ClassError::ProviderUnavailable(format!(
                "manager {} is skipped this cycle",
                manager.id()
            )));
        }

        let eligible: Vec<Arc<dyn InstanceManager>> = active
            .iter()
            .filter(|m| m.supports(worker_class))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Err(ClassError::NoEligibleManagers(worker_class.id.clone()));
        }

        let delta = self.determine_change_with(worker_class, &eligible).await?;

        let mut actions = PlannedActions {
            delta,
            bids: Vec::new(),
            kills: Vec::new(),
        };
        if delta > 0 {
            actions.bids = self
                .create_bids_with(worker_class, delta as u64, &eligible)
                .await?;
        } else if delta < 0 {
            actions.kills = self
                .create_kills_with(worker_class, delta.unsigned_abs(), &eligible)
                .await?;
        }
        Ok(actions)
    }

    fn eligible_managers(&self, worker_class: &WorkerClass) -> Vec<Arc<dyn InstanceManager>> {
        self.managers
            .iter()
            .filter(|m| m.supports(worker_class))
            .cloned()
            .collect()
    }

    /// Capacity delta for one worker class: positive creates, negative
    /// destroys, zero no-op. Assumes manager state was refreshed this
    /// cycle.
    pub async fn determine_change(&self, worker_class: &WorkerClass) -> Result<i64, ClassError> {
        worker_class.validate()?;
        let eligible = self.eligible_managers(worker_class);
        if eligible.is_empty() {
            return Err(ClassError::NoEligibleManagers(worker_class.id.clone()));
        }
        self.determine_change_with(worker_class, &eligible).await
    }

    async fn determine_change_with(
        &self,
        worker_class: &WorkerClass,
        eligible: &[Arc<dyn InstanceManager>],
    ) -> Result<i64, ClassError> {
        let snapshots = join_all(
            eligible
                .iter()
                .map(|manager| manager.current_capacity(worker_class)),
        )
        .await;

        let mut totals = CapacitySnapshot::default();
        for snapshot in snapshots {
            totals.absorb(snapshot?);
        }

        let pending_tasks = self
            .queue
            .pending_tasks(&worker_class.id)
            .await
            .map_err(|e| ClassError::QueueUnavailable(e.to_string()))?;

        let delta = compute_delta(pending_tasks, totals, worker_class);
        debug!(
            worker_class = %worker_class.id,
            pending_tasks,
            running_capacity = totals.running_capacity,
            pending_capacity = totals.pending_capacity,
            delta,
            "Computed capacity delta"
        );
        Ok(delta)
    }

    /// Bids covering at least `capacity_to_create` units.
    ///
    /// Greedy: every manager nominates its cheapest offered
    /// configuration, the cheapest nomination overall is purchased
    /// repeatedly until the target is covered. The overshoot is strictly
    /// less than the capacity of the largest configuration selected.
    pub async fn create_bids(
        &self,
        worker_class: &WorkerClass,
        capacity_to_create: u64,
    ) -> Result<Vec<Bid>, ClassError> {
        let eligible = self.eligible_managers(worker_class);
        if eligible.is_empty() {
            return Err(ClassError::NoEligibleManagers(worker_class.id.clone()));
        }
        self.create_bids_with(worker_class, capacity_to_create, &eligible)
            .await
    }

    async fn create_bids_with(
        &self,
        worker_class: &WorkerClass,
        capacity_to_create: u64,
        eligible: &[Arc<dyn InstanceManager>],
    ) -> Result<Vec<Bid>, ClassError> {
        let offers = join_all(eligible.iter().map(|manager| async move {
            let options = manager.launch_options(worker_class).await;
            (manager, options)
        }))
        .await;

        let mut winner: Option<(&Arc<dyn InstanceManager>, LaunchConfiguration)> = None;
        for (manager, options) in offers {
            let options: Vec<LaunchConfiguration> = options?
                .into_iter()
                .filter(|option| option.capacity > 0)
                .collect();
            let Some(best) = manager.cheapest_option(&options) else {
                continue;
            };
            match &winner {
                Some((_, current)) if best.unit_price >= current.unit_price => {}
                _ => winner = Some((manager, best.clone())),
            }
        }

        let Some((manager, config)) = winner else {
            return Err(ClassError::NoLaunchOptions(worker_class.id.clone()));
        };

        let mut bids = Vec::new();
        let mut acquired = 0u64;
        while acquired < capacity_to_create {
            acquired += config.capacity;
            bids.push(Bid {
                manager: Arc::clone(manager),
                config: config.clone(),
            });
        }

        debug!(
            worker_class = %worker_class.id,
            capacity_to_create,
            acquired,
            bids = bids.len(),
            manager = %manager.id(),
            instance_type = %config.instance_type,
            "Built create bids"
        );
        Ok(bids)
    }

    /// Kill batches summing to at most `capacity_to_destroy` units.
    ///
    /// Undershoot is allowed, overshoot never. Pending instances go
    /// first (cancelling a request is the cheapest undo), oldest request
    /// first; running instances only cover whatever remains, oldest
    /// first.
    pub async fn create_kills(
        &self,
        worker_class: &WorkerClass,
        capacity_to_destroy: u64,
    ) -> Result<Vec<Kill>, ClassError> {
        let eligible = self.eligible_managers(worker_class);
        if eligible.is_empty() {
            return Err(ClassError::NoEligibleManagers(worker_class.id.clone()));
        }
        self.create_kills_with(worker_class, capacity_to_destroy, &eligible)
            .await
    }

    async fn create_kills_with(
        &self,
        worker_class: &WorkerClass,
        capacity_to_destroy: u64,
        eligible: &[Arc<dyn InstanceManager>],
    ) -> Result<Vec<Kill>, ClassError> {
        let listings = join_all(
            eligible
                .iter()
                .map(|manager| manager.list_instances(worker_class)),
        )
        .await;

        let mut pending: Vec<(usize, Instance)> = Vec::new();
        let mut running: Vec<(usize, Instance)> = Vec::new();
        for (index, listing) in listings.into_iter().enumerate() {
            for instance in listing? {
                if instance.is_pending() {
                    pending.push((index, instance));
                } else {
                    running.push((index, instance));
                }
            }
        }

        // ULID instance IDs sort by request time: oldest first.
        pending.sort_by_key(|(_, instance)| instance.id);
        running.sort_by_key(|(_, instance)| instance.id);

        let mut remaining = capacity_to_destroy;
        let mut selected: Vec<Vec<Instance>> = vec![Vec::new(); eligible.len()];
        for (index, instance) in pending.into_iter().chain(running) {
            if remaining == 0 {
                break;
            }
            let Some(units) = worker_class.capacity_units(&instance.instance_type) else {
                continue;
            };
            if units <= remaining {
                remaining -= units;
                selected[index].push(instance);
            }
        }

        Ok(selected
            .into_iter()
            .zip(eligible)
            .filter(|(instances, _)| !instances.is_empty())
            .map(|(instances, manager)| Kill {
                manager: Arc::clone(manager),
                instances,
            })
            .collect())
    }

    /// Dispatches every bid concurrently and independently: one bid's
    /// failure never prevents submission of the others.
    pub async fn submit_bids(&self, bids: &[Bid]) -> Vec<Result<(), ManagerError>> {
        join_all(bids.iter().map(|bid| async move {
            match bid.manager.request_capacity(&bid.config).await {
                Ok(()) => {
                    debug!(
                        manager = %bid.manager.id(),
                        instance_type = %bid.config.instance_type,
                        capacity = bid.config.capacity,
                        "Bid submitted"
                    );
                    Ok(())
                }
                Err(e) => {
                    warn!(
                        manager = %bid.manager.id(),
                        instance_type = %bid.config.instance_type,
                        error = %e,
                        "Bid submission failed"
                    );
                    Err(e)
                }
            }
        }))
        .await
    }

    /// Dispatches every kill batch concurrently and independently.
    /// Pending targets are cancelled, running targets terminated;
    /// outcomes are tallied per instance.
    pub async fn submit_kills(&self, kills: &[Kill]) -> Vec<KillDispatch> {
        join_all(kills.iter().map(|kill| async move {
            let mut dispatch = KillDispatch {
                manager: kill.manager.id().clone(),
                removed: 0,
                failed: 0,
                contract_violation: None,
            };

            let (pending, running): (Vec<Instance>, Vec<Instance>) = kill
                .instances
                .iter()
                .cloned()
                .partition(|instance| instance.is_pending());

            if !pending.is_empty() {
                let count = pending.len();
                match kill.manager.cancel_requests(&pending).await {
                    Ok(outcomes) => tally(&mut dispatch, outcomes),
                    Err(e) => whole_batch_failed(&mut dispatch, e, count, "cancel"),
                }
            }
            if !running.is_empty() {
                let count = running.len();
                match kill.manager.kill_instances(&running).await {
                    Ok(outcomes) => tally(&mut dispatch, outcomes),
                    Err(e) => whole_batch_failed(&mut dispatch, e, count, "kill"),
                }
            }
            dispatch
        }))
        .await
    }
}

fn tally(dispatch: &mut KillDispatch, outcomes: Vec<stratus_manager::InstanceOutcome>) {
    for outcome in outcomes {
        match outcome.outcome {
            Ok(()) => dispatch.removed += 1,
            Err(e) if e.is_fatal() => {
                dispatch.failed += 1;
                dispatch
                    .contract_violation
                    .get_or_insert_with(|| e.to_string());
            }
            Err(e) => {
                warn!(
                    manager = %dispatch.manager,
                    instance_id = %outcome.instance_id,
                    error = %e,
                    "Kill failed for instance"
                );
                dispatch.failed += 1;
            }
        }
    }
}

fn whole_batch_failed(dispatch: &mut KillDispatch, error: ManagerError, count: usize, verb: &str) {
    if error.is_fatal() {
        dispatch
            .contract_violation
            .get_or_insert_with(|| error.to_string());
    } else {
        warn!(
            manager = %dispatch.manager,
            error = %error,
            instances = count,
            "Failed to {verb} instance batch"
        );
    }
    dispatch.failed += count;
}

fn first_contract_violation(
    bid_results: &[Result<(), ManagerError>],
    kill_dispatches: &[KillDispatch],
) -> Option<String> {
    for result in bid_results {
        if let Err(e) = result {
            if e.is_fatal() {
                return Some(e.to_string());
            }
        }
    }
    kill_dispatches
        .iter()
        .find_map(|dispatch| dispatch.contract_violation.clone())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;
    use stratus_capacity::WorkerClassId;

    use super::*;

    fn class(min: u64, max: u64, ratio: f64) -> WorkerClass {
        WorkerClass {
            id: WorkerClassId::new("builds"),
            min_capacity: min,
            max_capacity: max,
            scaling_ratio: ratio,
            capacity_per_instance: BTreeMap::from([("m5.large".to_string(), 4)]),
        }
    }

    #[rstest]
    // 10 pending tasks at ratio 1 with 4 units already pending leaves 6
    // units to create.
    #[case::pending_capacity_offsets_demand(10, 0, 4, 0, 100, 1.0, 6)]
    // No demand with 5 units running and a floor of 2: destroy at most
    // 3, leaving exactly the minimum.
    #[case::scale_down_stops_at_min_capacity(0, 5, 0, 2, 100, 1.0, -3)]
    // 4 + 4 + 12 lands exactly on the ceiling.
    #[case::clamps_to_max_capacity(1000, 4, 4, 0, 20, 1.0, 12)]
    // 5 tasks at ratio 0.5 need ceil(2.5) = 3 units.
    #[case::scaling_ratio_rounds_up(5, 0, 0, 0, 100, 0.5, 3)]
    #[case::zero_when_supply_matches_demand(8, 4, 4, 0, 100, 1.0, 0)]
    fn test_delta_cases(
        #[case] pending_tasks: u64,
        #[case] running: u64,
        #[case] pending: u64,
        #[case] min: u64,
        #[case] max: u64,
        #[case] ratio: f64,
        #[case] expected: i64,
    ) {
        let totals = CapacitySnapshot::new(running, pending);
        assert_eq!(
            compute_delta(pending_tasks, totals, &class(min, max, ratio)),
            expected
        );
    }

    #[test]
    fn test_delta_survives_extreme_capacities() {
        // Bounds and manager reports near u64::MAX must not truncate or
        // overflow on the way into signed arithmetic.
        let wc = class(0, u64::MAX, 1.0);
        let saturated = CapacitySnapshot::new(u64::MAX, u64::MAX);
        assert_eq!(compute_delta(u64::MAX, saturated, &wc), 0);
        assert_eq!(compute_delta(0, saturated, &wc), -i64::MAX);
        assert_eq!(
            compute_delta(u64::MAX, CapacitySnapshot::default(), &wc),
            i64::MAX
        );
    }

    #[test]
    fn test_delta_never_leaves_bounds() {
        let wc = class(3, 9, 1.0);
        for pending_tasks in 0..30u64 {
            for running in 0..12u64 {
                let totals = CapacitySnapshot::new(running, 0);
                let delta = compute_delta(pending_tasks, totals, &wc);
                let post = totals.total() as i64 + delta;
                assert!(
                    (3..=9).contains(&post),
                    "post-cycle capacity {post} out of bounds for tasks={pending_tasks} running={running}"
                );
            }
        }
    }
}
