//! Instances as the provisioner sees them.
//!
//! An instance carries only what the reconciliation loop needs: a state
//! tag deciding whether it counts against running or pending capacity, an
//! instance type keying into the worker class capacity map, and an opaque
//! handle owned by the instance manager that reported it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A typed, time-ordered instance ID.
///
/// ULID-based so that sorting instance IDs sorts by request time, which
/// is what oldest-first kill selection relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(Ulid);

impl InstanceId {
    /// The prefix for this ID type.
    pub const PREFIX: &'static str = "inst";

    /// Creates a new ID with a fresh ULID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates an ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the timestamp portion of the ULID in milliseconds.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    /// Parses an ID from its `inst_{ulid}` string form.
    pub fn parse(s: &str) -> Result<Self, crate::IdError> {
        if s.is_empty() {
            return Err(crate::IdError::Empty);
        }

        let Some((prefix, ulid_str)) = s.split_once('_') else {
            return Err(crate::IdError::MissingSeparator);
        };

        if prefix != Self::PREFIX {
            return Err(crate::IdError::InvalidPrefix {
                expected: Self::PREFIX,
                actual: prefix.to_string(),
            });
        }

        let ulid = ulid_str
            .parse::<Ulid>()
            .map_err(|e| crate::IdError::InvalidUlid(e.to_string()))?;

        Ok(Self(ulid))
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", Self::PREFIX, self.0)
    }
}

impl std::str::FromStr for InstanceId {
    type Err = crate::IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for InstanceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for InstanceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle state of an instance, from the provisioner's point of view.
///
/// Backends have richer state machines; a manager maps whatever its
/// provider reports onto these two states. A pending instance may become
/// running as observed through the manager; the reverse transition is
/// invalid. An instance that the provider no longer reports simply stops
/// appearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Requested but not yet serving work. Counts against pending capacity.
    Pending,

    /// Booted and able to take work. Counts against running capacity.
    Running,
}

/// A unit of supply reported by one instance manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub state: InstanceState,

    /// Instance type name, keying into the worker class's
    /// capacity-per-instance map.
    pub instance_type: String,

    /// Provider-specific handle. Owned by the manager that reported this
    /// instance; the provisioner never interprets it.
    pub handle: serde_json::Value,
}

impl Instance {
    /// Creates a pending instance with a fresh ID.
    pub fn pending(instance_type: impl Into<String>, handle: serde_json::Value) -> Self {
        Self {
            id: InstanceId::new(),
            state: InstanceState::Pending,
            instance_type: instance_type.into(),
            handle,
        }
    }

    /// Creates a running instance with a fresh ID.
    pub fn running(instance_type: impl Into<String>, handle: serde_json::Value) -> Self {
        Self {
            id: InstanceId::new(),
            state: InstanceState::Running,
            instance_type: instance_type.into(),
            handle,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == InstanceState::Pending
    }

    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }

    /// When this instance was requested, from the ID's ULID timestamp.
    pub fn requested_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.id.timestamp_ms() as i64)
            .single()
            .unwrap_or_else(Utc::now)
    }
}
