//! Stratus Provisioner
//!
//! Background service that matches pending-work demand against cloud
//! instance supply: it periodically reconciles each worker class's
//! desired capacity and submits bids or kills through the configured
//! instance managers.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::json;
use stratus_capacity::{LaunchConfiguration, WorkerClass, WorkerClassId};
use stratus_manager::mock::MockManager;
use stratus_manager::InstanceManager;
use stratus_provisioner::{
    config, JsonFileStore, Provisioner, ProvisionerWorker, StaticQueue, StaticStore,
    WorkQueue, WorkerClassStore,
};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to STRATUS_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting stratus provisioner");
    info!(
        cycle_interval_secs = config.cycle_interval.as_secs(),
        dev_mode = config.dev_mode,
        "Configuration loaded"
    );

    let store: Arc<dyn WorkerClassStore> = match &config.worker_classes_path {
        Some(path) => {
            info!(path = %path.display(), "Loading worker classes from file");
            Arc::new(JsonFileStore::new(path))
        }
        None if config.dev_mode => {
            info!("No worker class file configured, using dev defaults");
            Arc::new(StaticStore::new(dev_worker_classes()))
        }
        None => {
            bail!("STRATUS_WORKER_CLASSES must be set (or enable STRATUS_DEV for the dev harness)")
        }
    };

    let managers: Vec<Arc<dyn InstanceManager>> = if config.dev_mode {
        let classes = store.load_worker_classes().await?;
        vec![dev_manager(&classes)]
    } else {
        // Real cloud backends register here once their crates land.
        bail!("no instance manager backends are configured; enable STRATUS_DEV for the dev harness")
    };

    let queue: Arc<dyn WorkQueue> = {
        let queue = StaticQueue::new();
        if config.dev_mode {
            queue.set("builds", 10);
        }
        Arc::new(queue)
    };

    let mut provisioner = Provisioner::new("provisioner", managers, queue, store);
    if let Some(deadline) = config.cycle_deadline {
        provisioner = provisioner.with_deadline(deadline);
    }
    let provisioner = Arc::new(provisioner);

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start provisioner worker in background
    let worker = ProvisionerWorker::new(Arc::clone(&provisioner), config.cycle_interval);
    let worker_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Signal shutdown and wait for the worker to finish
    let _ = shutdown_tx.send(true);

    let shutdown_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, worker_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Provisioner worker task failed"),
        Err(e) => warn!(error = %e, "Provisioner worker did not shut down in time"),
    }

    info!("Shutdown complete");
    Ok(())
}

fn dev_worker_classes() -> Vec<WorkerClass> {
    vec![WorkerClass {
        id: WorkerClassId::new("builds"),
        min_capacity: 0,
        max_capacity: 20,
        scaling_ratio: 1.0,
        capacity_per_instance: BTreeMap::from([
            ("m5.large".to_string(), 4),
            ("m5.xlarge".to_string(), 8),
        ]),
    }]
}

/// In-memory manager seeded with launch options for every dev class.
fn dev_manager(classes: &[WorkerClass]) -> Arc<dyn InstanceManager> {
    let mut manager = MockManager::new("dev");
    for class in classes {
        let options = class
            .capacity_per_instance
            .iter()
            .map(|(instance_type, units)| {
                LaunchConfiguration::new(instance_type, *units, 100_000 * units)
                    .with_payload(json!({"pool": "dev"}))
            })
            .collect();
        manager = manager.with_class(class.id.clone(), options);
    }
    Arc::new(manager)
}
