//! Worker classes: one category of demand with its own scaling bounds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Name of a worker class, e.g. `"builds-linux-large"`.
///
/// Worker classes are operator-defined configuration, so the ID is the
/// configured name rather than a generated ULID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerClassId(String);

impl WorkerClassId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for WorkerClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerClassId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Scaling configuration for one class of demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerClass {
    pub id: WorkerClassId,

    /// Total capacity (running + pending) never reconciled below this.
    pub min_capacity: u64,

    /// Total capacity (running + pending) never reconciled above this.
    pub max_capacity: u64,

    /// Multiplier applied to the pending-task count to get desired
    /// capacity. 1.0 means one capacity unit per pending task.
    pub scaling_ratio: f64,

    /// Capacity units one instance of each type provides for this class.
    /// Instance types absent from this map are not usable for the class.
    #[serde(default)]
    pub capacity_per_instance: BTreeMap<String, u64>,
}

impl WorkerClass {
    /// Checks the configuration invariants.
    ///
    /// Invalid classes are skipped for the cycle and surfaced; siblings
    /// still reconcile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::EmptyId);
        }

        if self.min_capacity > self.max_capacity {
            return Err(ConfigError::InvalidBounds {
                min: self.min_capacity,
                max: self.max_capacity,
            });
        }

        if !self.scaling_ratio.is_finite() || self.scaling_ratio < 0.0 {
            return Err(ConfigError::InvalidScalingRatio(self.scaling_ratio));
        }

        for (instance_type, units) in &self.capacity_per_instance {
            if *units == 0 {
                return Err(ConfigError::ZeroCapacityUnits(instance_type.clone()));
            }
        }

        Ok(())
    }

    /// Capacity units one instance of the given type provides, if the
    /// type is usable for this class.
    pub fn capacity_units(&self, instance_type: &str) -> Option<u64> {
        self.capacity_per_instance.get(instance_type).copied()
    }
}
