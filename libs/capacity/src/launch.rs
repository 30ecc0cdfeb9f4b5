//! Launch configurations: purchasable templates for creating capacity.

use serde::{Deserialize, Serialize};

/// A purchasable template describing one way to buy capacity.
///
/// Produced by an instance manager and consumed only by that same
/// manager; the provisioner looks at `capacity` and `unit_price` and
/// passes the rest through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchConfiguration {
    /// Instance type this template launches.
    pub instance_type: String,

    /// Capacity units one purchase of this template provides.
    pub capacity: u64,

    /// Price in micro-dollars per hour. Integer so that price comparison
    /// is total-ordered and ties break deterministically.
    pub unit_price: u64,

    /// Provider-specific launch payload (AMI, region, size slug, ...).
    /// Opaque to the provisioner.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl LaunchConfiguration {
    pub fn new(instance_type: impl Into<String>, capacity: u64, unit_price: u64) -> Self {
        Self {
            instance_type: instance_type.into(),
            capacity,
            unit_price,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
