//! stratus Provisioner Library
//!
//! The provisioner is the autoscaling control loop of the platform. Each
//! cycle it reconciles compute demand (pending work items per worker
//! class) against compute supply (instances across all cloud backends),
//! issuing create and destroy decisions.
//!
//! ## Cycle shape
//!
//! ```text
//! refresh manager state  ─┐  (all managers, concurrent)
//! pre-provisioning hooks ─┤
//! load worker classes    ─┤  (failure aborts the cycle)
//! plan each class        ─┤  (concurrent, failures isolated)
//! submit bids and kills  ─┤  (concurrent, failures collected)
//! post-provisioning hooks┘
//! ```
//!
//! ## Modules
//!
//! - `provisioner`: the reconciliation loop itself
//! - `queue` / `store`: injected collaborator interfaces
//! - `worker`: periodic background driver
//! - `outcome`: structured per-cycle result

pub mod config;
pub mod error;
pub mod outcome;
pub mod provisioner;
pub mod queue;
pub mod store;
pub mod worker;

// Re-export commonly used types
pub use error::{ClassError, CycleError};
pub use outcome::{ClassReport, ClassStats, ClassStatus, CycleOutcome, ManagerReport, ManagerStatus};
pub use provisioner::{Bid, Kill, KillDispatch, Provisioner};
pub use queue::{StaticQueue, WorkQueue};
pub use store::{JsonFileStore, StaticStore, WorkerClassStore};
pub use worker::ProvisionerWorker;
