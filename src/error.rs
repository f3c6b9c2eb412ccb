// SPDX-License-Identifier: MPL-2.0

//! Error types shared by the telemetry backends, the sampler and configuration.
//!
//! Only [`TelemetryError`] is fatal. A [`DeviceReadError`] never leaves the
//! sampler as a fault: it is recorded in the batch and the device is simply
//! omitted for that tick.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while bringing a telemetry backend up.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The management library or tool could not be initialized at all.
    #[error("{provider} backend unavailable: {reason}")]
    ProviderInit {
        provider: &'static str,
        reason: String,
    },
    /// Every backend in the preference order failed to initialize.
    #[error("no telemetry backend available ({0})")]
    NoProvider(String),
}

/// A single device could not be read during one sampling tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceReadError {
    /// The read did not complete within the per-device timeout.
    #[error("read timed out after {0} ms")]
    Timeout(u64),
    /// The previous read of this device has not returned yet.
    #[error("previous read still running")]
    Busy,
    /// The backend reported an error for this device.
    #[error("query failed: {0}")]
    Query(String),
    /// A required field was missing or could not be parsed.
    #[error("malformed {field}: {value:?}")]
    Malformed { field: &'static str, value: String },
    /// The blocking read task panicked or was cancelled.
    #[error("read task aborted: {0}")]
    Aborted(String),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
