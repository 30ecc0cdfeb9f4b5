//! Provisioner background worker.
//!
//! Runs the reconciliation loop on a periodic interval until shutdown
//! is signaled.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::error::CycleError;
use crate::provisioner::Provisioner;

/// Worker that drives a [`Provisioner`] on a fixed interval.
pub struct ProvisionerWorker {
    provisioner: Arc<Provisioner>,
    interval: Duration,
}

impl ProvisionerWorker {
    pub fn new(provisioner: Arc<Provisioner>, interval: Duration) -> Self {
        Self {
            provisioner,
            interval,
        }
    }

    /// Run the worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting provisioner worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Provisioner worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single reconciliation cycle.
    ///
    /// A cycle still in flight from the previous tick is left alone
    /// rather than queued behind; piling up cycles would only amplify
    /// whatever is making them slow.
    async fn run_cycle(&self) {
        match self.provisioner.try_iterate().await {
            Ok(outcome) => {
                if !outcome.fully_reconciled() {
                    warn!(
                        classes = outcome.classes.len(),
                        bids_submitted = outcome.bids_submitted(),
                        instances_removed = outcome.instances_removed(),
                        "Reconciliation cycle finished with failures"
                    );
                }
            }
            Err(CycleError::CycleInProgress) => {
                warn!("Previous reconciliation cycle still running, skipping tick");
            }
            Err(e) => {
                error!(error = %e, "Reconciliation cycle failed");
            }
        }
    }
}
