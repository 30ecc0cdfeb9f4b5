//! Error types for capacity value parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing an instance ID.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("ID string is empty")]
    Empty,

    /// The input has no `_` separator between prefix and ULID.
    #[error("ID is missing the prefix separator")]
    MissingSeparator,

    /// The prefix does not match the expected resource type.
    #[error("invalid ID prefix: expected {expected}, got {actual}")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The ULID portion failed to parse.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),
}

/// Errors produced by worker class validation.
///
/// A worker class that fails validation is skipped for the cycle; its
/// siblings still reconcile.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The worker class ID is empty.
    #[error("worker class ID is empty")]
    EmptyId,

    /// minCapacity exceeds maxCapacity.
    #[error("invalid capacity bounds: min {min} > max {max}")]
    InvalidBounds { min: u64, max: u64 },

    /// The scaling ratio is negative, NaN, or infinite.
    #[error("invalid scaling ratio: {0}")]
    InvalidScalingRatio(f64),

    /// A capacity-per-instance entry is zero.
    #[error("instance type {0:?} declares zero capacity units")]
    ZeroCapacityUnits(String),
}
