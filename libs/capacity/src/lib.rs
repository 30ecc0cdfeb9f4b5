//! # stratus-capacity
//!
//! Value types shared between the provisioner and its instance managers.
//!
//! ## Design Principles
//!
//! - Everything here is a plain value: no I/O, no provider knowledge.
//! - The provisioner counts in *capacity units* — the number of concurrent
//!   work items one instance can absorb — never in raw instance counts.
//! - Provider-specific data rides along as opaque payloads that only the
//!   instance manager that produced them may interpret.

mod error;
mod instance;
mod launch;
mod snapshot;
mod worker_class;

pub use error::{ConfigError, IdError};
pub use instance::{Instance, InstanceId, InstanceState};
pub use launch::LaunchConfiguration;
pub use snapshot::CapacitySnapshot;
pub use worker_class::{WorkerClass, WorkerClassId};
