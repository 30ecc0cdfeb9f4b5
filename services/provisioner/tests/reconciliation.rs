//! End-to-end cycles against in-memory backends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use stratus_capacity::{Instance, LaunchConfiguration, WorkerClass, WorkerClassId};
use stratus_manager::mock::MockManager;
use stratus_manager::InstanceManager;
use stratus_provisioner::{
    ClassStatus, CycleError, Kill, ManagerStatus, Provisioner, StaticQueue, StaticStore,
    WorkQueue, WorkerClassStore,
};

fn worker_class(id: &str, min: u64, max: u64, ratio: f64, types: &[(&str, u64)]) -> WorkerClass {
    WorkerClass {
        id: WorkerClassId::new(id),
        min_capacity: min,
        max_capacity: max,
        scaling_ratio: ratio,
        capacity_per_instance: types
            .iter()
            .map(|(t, units)| (t.to_string(), *units))
            .collect(),
    }
}

fn harness(
    classes: Vec<WorkerClass>,
    managers: Vec<Arc<MockManager>>,
) -> (Arc<Provisioner>, Arc<StaticQueue>) {
    let queue = Arc::new(StaticQueue::new());
    let managers = managers
        .into_iter()
        .map(|m| m as Arc<dyn InstanceManager>)
        .collect();
    let provisioner = Provisioner::new(
        "test",
        managers,
        Arc::clone(&queue) as Arc<dyn WorkQueue>,
        Arc::new(StaticStore::new(classes)),
    );
    (Arc::new(provisioner), queue)
}

#[tokio::test]
async fn test_scale_up_buys_cheapest_configuration() {
    // 10 pending tasks, 4 units already pending: 6 units to create.
    // The 2-unit configuration is cheaper per unit, so three of those.
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4), ("t3.medium", 2)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![
            LaunchConfiguration::new("m5.large", 4, 2_000_000),
            LaunchConfiguration::new("t3.medium", 2, 1_000_000),
        ],
    ));
    manager.add_instance("builds", Instance::pending("m5.large", Value::Null));

    let (provisioner, queue) = harness(vec![class.clone()], vec![Arc::clone(&manager)]);
    queue.set("builds", 10);

    let outcome = provisioner.iterate().await.unwrap();

    let stats = outcome
        .class(&class.id)
        .and_then(|c| c.stats())
        .copied()
        .unwrap();
    assert_eq!(stats.delta, 6);
    assert_eq!(stats.bids_submitted, 3);
    assert_eq!(stats.bids_failed, 0);

    // The requests land as pending capacity immediately.
    let snapshot = manager.current_capacity(&class).await.unwrap();
    assert_eq!(snapshot.pending_capacity, 4 + 6);
    assert!(outcome.fully_reconciled());
}

#[tokio::test]
async fn test_scale_down_stops_at_min_capacity() {
    // No demand with 5 single-unit instances running and a floor of 2:
    // exactly 3 get killed.
    let class = worker_class("builds", 2, 100, 1.0, &[("c5.large", 1)]);
    let manager =
        Arc::new(MockManager::new("ec2").with_class("builds", vec![LaunchConfiguration::new(
            "c5.large", 1, 500_000,
        )]));
    for _ in 0..5 {
        manager.add_instance("builds", Instance::running("c5.large", Value::Null));
    }

    let (provisioner, _queue) = harness(vec![class.clone()], vec![Arc::clone(&manager)]);

    let outcome = provisioner.iterate().await.unwrap();

    let stats = outcome
        .class(&class.id)
        .and_then(|c| c.stats())
        .copied()
        .unwrap();
    assert_eq!(stats.delta, -3);
    assert_eq!(stats.instances_removed, 3);
    assert_eq!(manager.instances("builds").len(), 2);
}

#[tokio::test]
async fn test_tied_prices_go_to_first_manager() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let first = Arc::new(MockManager::new("first").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    let second = Arc::new(MockManager::new("second").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));

    let (provisioner, _queue) = harness(
        vec![class.clone()],
        vec![Arc::clone(&first), Arc::clone(&second)],
    );

    let bids = provisioner.create_bids(&class, 8).await.unwrap();
    assert_eq!(bids.len(), 2);
    assert!(bids.iter().all(|bid| bid.manager.id().as_str() == "first"));
}

#[tokio::test]
async fn test_overshoot_is_bounded_by_winning_configuration() {
    let class = worker_class("builds", 0, 100, 1.0, &[("t3.medium", 2)]);
    let manager =
        Arc::new(MockManager::new("ec2").with_class("builds", vec![LaunchConfiguration::new(
            "t3.medium",
            2,
            1_000_000,
        )]));

    let (provisioner, _queue) = harness(vec![class.clone()], vec![manager]);

    let bids = provisioner.create_bids(&class, 5).await.unwrap();
    let acquired: u64 = bids.iter().map(|bid| bid.config.capacity).sum();
    assert!(acquired >= 5);
    assert!(acquired - 5 < 2, "overshoot {} too large", acquired - 5);
}

#[tokio::test]
async fn test_zero_capacity_options_are_unusable() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager =
        Arc::new(MockManager::new("ec2").with_class("builds", vec![LaunchConfiguration::new(
            "m5.large", 0, 1_000_000,
        )]));

    let (provisioner, _queue) = harness(vec![class.clone()], vec![manager]);

    let err = provisioner.create_bids(&class, 4).await.unwrap_err();
    assert!(matches!(
        err,
        stratus_provisioner::ClassError::NoLaunchOptions(_)
    ));
}

#[tokio::test]
async fn test_kills_exhaust_pending_before_running() {
    let class = worker_class("builds", 0, 100, 1.0, &[("t3.medium", 2)]);
    let manager = Arc::new(MockManager::new("ec2").with_class("builds", vec![]));
    for _ in 0..2 {
        manager.add_instance("builds", Instance::pending("t3.medium", Value::Null));
        manager.add_instance("builds", Instance::running("t3.medium", Value::Null));
    }

    let (provisioner, _queue) = harness(vec![class.clone()], vec![manager]);

    let kills = provisioner.create_kills(&class, 4).await.unwrap();
    assert_eq!(kills.len(), 1);
    assert_eq!(kills[0].instances.len(), 2);
    assert!(kills[0].instances.iter().all(|i| i.is_pending()));
}

#[tokio::test]
async fn test_kills_never_overshoot() {
    // 3 units to destroy, only 2-unit instances: a single instance is
    // selected and one unit of surplus survives.
    let class = worker_class("builds", 0, 100, 1.0, &[("t3.medium", 2)]);
    let manager = Arc::new(MockManager::new("ec2").with_class("builds", vec![]));
    for _ in 0..3 {
        manager.add_instance("builds", Instance::running("t3.medium", Value::Null));
    }

    let (provisioner, _queue) = harness(vec![class.clone()], vec![manager]);

    let kills = provisioner.create_kills(&class, 3).await.unwrap();
    let selected: u64 = kills
        .iter()
        .flat_map(|kill| &kill.instances)
        .map(|i| class.capacity_units(&i.instance_type).unwrap())
        .sum();
    assert_eq!(selected, 2);
}

#[tokio::test]
async fn test_failing_manager_only_defers_its_own_classes() {
    let builds = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let tests = worker_class("tests", 0, 100, 1.0, &[("t3.medium", 2)]);

    let broken = Arc::new(MockManager::new("broken").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    let healthy = Arc::new(MockManager::new("healthy").with_class(
        "tests",
        vec![LaunchConfiguration::new("t3.medium", 2, 1_000_000)],
    ));
    broken.set_fail_updates(true);

    let (provisioner, queue) = harness(
        vec![builds.clone(), tests.clone()],
        vec![Arc::clone(&broken), Arc::clone(&healthy)],
    );
    queue.set("builds", 8);
    queue.set("tests", 4);

    let outcome = provisioner.iterate().await.unwrap();

    // The broken manager's class is deferred, never reconciled against
    // a partial capacity view.
    assert!(matches!(
        outcome.class(&builds.id).unwrap().status,
        ClassStatus::Skipped { .. }
    ));
    assert!(matches!(
        outcome.manager(broken.id()).unwrap().status,
        ManagerStatus::UpdateFailed(_)
    ));
    assert_eq!(broken.instances("builds").len(), 0);

    // The unrelated class reconciles normally.
    let stats = outcome.class(&tests.id).and_then(|c| c.stats()).unwrap();
    assert_eq!(stats.bids_submitted, 2);
}

#[tokio::test]
async fn test_pre_hook_failure_sits_manager_out() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    manager.set_fail_pre_hook(true);

    let (provisioner, queue) = harness(vec![class.clone()], vec![Arc::clone(&manager)]);
    queue.set("builds", 8);

    let outcome = provisioner.iterate().await.unwrap();

    assert!(matches!(
        outcome.manager(manager.id()).unwrap().status,
        ManagerStatus::PreHookFailed(_)
    ));
    assert!(matches!(
        outcome.class(&class.id).unwrap().status,
        ClassStatus::Skipped { .. }
    ));
    assert_eq!(manager.instances("builds").len(), 0);
}

#[tokio::test]
async fn test_post_hook_failure_is_housekeeping_only() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    manager.set_fail_post_hook(true);

    let (provisioner, queue) = harness(vec![class.clone()], vec![Arc::clone(&manager)]);
    queue.set("builds", 4);

    let outcome = provisioner.iterate().await.unwrap();

    let report = outcome.manager(manager.id()).unwrap();
    assert!(report.participating());
    assert!(report.post_hook_error.is_some());
    assert_eq!(outcome.bids_submitted(), 1);
}

#[tokio::test]
async fn test_rejected_bids_are_collected_not_raised() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    manager.set_fail_requests(true);

    let (provisioner, queue) = harness(vec![class.clone()], vec![manager]);
    queue.set("builds", 8);

    let outcome = provisioner.iterate().await.unwrap();

    let stats = outcome.class(&class.id).and_then(|c| c.stats()).unwrap();
    assert_eq!(stats.bids_submitted, 0);
    assert_eq!(stats.bids_failed, 2);
    assert!(!outcome.fully_reconciled());
}

#[tokio::test]
async fn test_failed_kill_leaves_siblings_unaffected() {
    let class = worker_class("builds", 0, 100, 1.0, &[("c5.large", 1)]);
    let manager = Arc::new(MockManager::new("ec2").with_class("builds", vec![]));
    let doomed = Instance::running("c5.large", Value::Null);
    manager.add_instance("builds", doomed.clone());
    for _ in 0..4 {
        manager.add_instance("builds", Instance::running("c5.large", Value::Null));
    }
    manager.doom_instance(doomed.id);

    let (provisioner, _queue) = harness(vec![class.clone()], vec![Arc::clone(&manager)]);

    // Demand 0, min 0: all 5 units should go; the doomed one fails.
    let outcome = provisioner.iterate().await.unwrap();

    let stats = outcome.class(&class.id).and_then(|c| c.stats()).unwrap();
    assert_eq!(stats.delta, -5);
    assert_eq!(stats.instances_removed, 4);
    assert_eq!(stats.kills_failed, 1);
    assert_eq!(manager.instances("builds").len(), 1);
}

#[tokio::test]
async fn test_invalid_class_is_skipped_siblings_proceed() {
    let broken = worker_class("broken", 10, 2, 1.0, &[("m5.large", 4)]);
    let healthy = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(
        MockManager::new("ec2")
            .with_class(
                "broken",
                vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
            )
            .with_class(
                "builds",
                vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
            ),
    );

    let (provisioner, queue) = harness(vec![broken.clone(), healthy.clone()], vec![manager]);
    queue.set("builds", 4);

    let outcome = provisioner.iterate().await.unwrap();

    assert!(matches!(
        outcome.class(&broken.id).unwrap().status,
        ClassStatus::Skipped { .. }
    ));
    let stats = outcome.class(&healthy.id).and_then(|c| c.stats()).unwrap();
    assert_eq!(stats.bids_submitted, 1);
}

#[tokio::test]
async fn test_class_without_eligible_manager_is_skipped() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class("tests", vec![]));

    let (provisioner, _queue) = harness(vec![class.clone()], vec![manager]);

    let outcome = provisioner.iterate().await.unwrap();
    assert!(matches!(
        outcome.class(&class.id).unwrap().status,
        ClassStatus::Skipped { .. }
    ));
}

#[tokio::test]
async fn test_store_failure_aborts_the_cycle() {
    struct FailingStore;

    #[async_trait::async_trait]
    impl WorkerClassStore for FailingStore {
        async fn load_worker_classes(&self) -> anyhow::Result<Vec<WorkerClass>> {
            anyhow::bail!("config service unreachable")
        }
    }

    let queue = Arc::new(StaticQueue::new());
    let provisioner = Provisioner::new(
        "test",
        vec![],
        queue as Arc<dyn WorkQueue>,
        Arc::new(FailingStore),
    );

    let err = provisioner.iterate().await.unwrap_err();
    assert!(matches!(err, CycleError::Orchestration(_)));
}

#[tokio::test]
async fn test_misrouted_kill_is_a_contract_violation() {
    let manager: Arc<dyn InstanceManager> =
        Arc::new(MockManager::new("ec2").with_class("builds", vec![]));
    let queue = Arc::new(StaticQueue::new());
    let provisioner = Provisioner::new(
        "test",
        vec![Arc::clone(&manager)],
        queue as Arc<dyn WorkQueue>,
        Arc::new(StaticStore::new(vec![])),
    );

    // An instance this manager never reported.
    let foreign = Instance::running("m5.large", Value::Null);
    let dispatches = provisioner
        .submit_kills(&[Kill {
            manager,
            instances: vec![foreign],
        }])
        .await;

    assert!(dispatches[0].contract_violation.is_some());
    assert_eq!(dispatches[0].removed, 0);
}

#[tokio::test]
async fn test_only_one_cycle_runs_at_a_time() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    manager.set_update_delay(Duration::from_millis(200));

    let (provisioner, _queue) = harness(vec![class], vec![Arc::clone(&manager)]);

    let background = tokio::spawn({
        let provisioner = Arc::clone(&provisioner);
        async move { provisioner.iterate().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = provisioner.try_iterate().await.unwrap_err();
    assert!(matches!(err, CycleError::CycleInProgress));

    // The in-flight cycle completes normally.
    assert!(background.await.unwrap().is_ok());
    assert_eq!(manager.update_calls(), 1);
}

#[tokio::test]
async fn test_iterate_queues_behind_running_cycle() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    manager.set_update_delay(Duration::from_millis(50));

    let (provisioner, _queue) = harness(vec![class], vec![Arc::clone(&manager)]);

    let first = tokio::spawn({
        let provisioner = Arc::clone(&provisioner);
        async move { provisioner.iterate().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Blocks until the first cycle releases the guard, then runs.
    provisioner.iterate().await.unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(manager.update_calls(), 2);
}

#[tokio::test]
async fn test_deadline_overrun_is_flagged_not_cancelled() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    manager.set_update_delay(Duration::from_millis(50));

    let queue = Arc::new(StaticQueue::new());
    queue.set("builds", 4);
    let provisioner = Provisioner::new(
        "test",
        vec![Arc::clone(&manager) as Arc<dyn InstanceManager>],
        Arc::clone(&queue) as Arc<dyn WorkQueue>,
        Arc::new(StaticStore::new(vec![class])),
    )
    .with_deadline(Duration::from_millis(1));

    let outcome = provisioner.iterate().await.unwrap();

    // The cycle still did its work; the overrun is only reported.
    assert!(outcome.timed_out);
    assert_eq!(outcome.bids_submitted(), 1);
}

#[tokio::test]
async fn test_steady_state_cycle_is_a_no_op() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    manager.add_instance("builds", Instance::running("m5.large", Value::Null));

    let (provisioner, queue) = harness(vec![class.clone()], vec![Arc::clone(&manager)]);
    queue.set("builds", 4);

    let outcome = provisioner.iterate().await.unwrap();

    let stats = outcome.class(&class.id).and_then(|c| c.stats()).unwrap();
    assert_eq!(stats.delta, 0);
    assert_eq!(stats.bids_submitted, 0);
    assert_eq!(stats.instances_removed, 0);
    assert_eq!(manager.instances("builds").len(), 1);
}

#[tokio::test]
async fn test_converges_over_consecutive_cycles() {
    let class = worker_class("builds", 0, 100, 1.0, &[("t3.medium", 2)]);
    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("t3.medium", 2, 1_000_000)],
    ));

    let (provisioner, queue) = harness(vec![class.clone()], vec![Arc::clone(&manager)]);
    queue.set("builds", 6);

    // Cycle 1 creates the capacity.
    let outcome = provisioner.iterate().await.unwrap();
    assert_eq!(outcome.bids_submitted(), 3);

    // Cycle 2 sees its own in-flight requests and stands pat.
    let outcome = provisioner.iterate().await.unwrap();
    assert_eq!(outcome.bids_submitted(), 0);

    // The backend boots everything and the work drains away; capacity
    // is torn back down.
    manager.promote_pending("builds");
    queue.set("builds", 0);
    let outcome = provisioner.iterate().await.unwrap();
    assert_eq!(outcome.instances_removed(), 3);
    assert!(manager.instances("builds").is_empty());
}

#[tokio::test]
async fn test_json_file_store_feeds_the_cycle() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{
            "id": "builds",
            "min_capacity": 0,
            "max_capacity": 100,
            "scaling_ratio": 1.0,
            "capacity_per_instance": {{"m5.large": 4}}
        }}]"#
    )
    .unwrap();

    let manager = Arc::new(MockManager::new("ec2").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    let queue = Arc::new(StaticQueue::new());
    queue.set("builds", 4);

    let provisioner = Provisioner::new(
        "test",
        vec![Arc::clone(&manager) as Arc<dyn InstanceManager>],
        Arc::clone(&queue) as Arc<dyn WorkQueue>,
        Arc::new(stratus_provisioner::JsonFileStore::new(file.path())),
    );

    let outcome = provisioner.iterate().await.unwrap();
    assert_eq!(outcome.bids_submitted(), 1);
}

#[tokio::test]
async fn test_capacity_split_across_managers_is_summed() {
    let class = worker_class("builds", 0, 100, 1.0, &[("m5.large", 4)]);
    let a = Arc::new(MockManager::new("a").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 1_000_000)],
    ));
    let b = Arc::new(MockManager::new("b").with_class(
        "builds",
        vec![LaunchConfiguration::new("m5.large", 4, 2_000_000)],
    ));
    a.add_instance("builds", Instance::running("m5.large", Value::Null));
    b.add_instance("builds", Instance::running("m5.large", Value::Null));

    let (provisioner, queue) = harness(vec![class.clone()], vec![a, b]);
    queue.set("builds", 8);

    // 8 needed, 4 + 4 already running across the two backends.
    let delta = provisioner.determine_change(&class).await.unwrap();
    assert_eq!(delta, 0);
}

#[test]
fn test_worker_class_map_is_deterministic() {
    // BTreeMap keeps instance types ordered, so listings and capacity
    // walks are stable across runs.
    let class = worker_class("builds", 0, 10, 1.0, &[("b", 2), ("a", 1)]);
    let types: Vec<&str> = class
        .capacity_per_instance
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(types, ["a", "b"]);
    let _: &BTreeMap<String, u64> = &class.capacity_per_instance;
}
