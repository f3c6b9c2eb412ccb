// SPDX-License-Identifier: MPL-2.0

//! # GPU Telemetry
//!
//! Hardware access is hidden behind [`TelemetryProvider`]. Two backends exist:
//!
//! 1. **NVML** through `nvml-wrapper` (preferred, richer: every fan, power limit)
//! 2. **nvidia-smi** CSV queries (baseline, needs only the driver's CLI tool)
//!
//! The backend is picked once by [`select_provider`]; the rest of the crate only
//! ever sees the trait object.

#[cfg(feature = "nvml")]
pub mod nvml;
pub mod sampler;
pub mod smi;

pub use sampler::{SampleBatch, TelemetrySampler};

use crate::config::ProviderPreference;
use crate::error::{DeviceReadError, TelemetryError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stable device identifier (the GPU UUID reported by the driver).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One immutable reading of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuSnapshot {
    pub device_id: DeviceId,
    /// Enumeration order on the bus
    pub index: u32,
    pub name: String,
    pub utilization_pct: u32,
    pub memory_utilization_pct: u32,
    pub vram_used_bytes: u64,
    pub vram_total_bytes: u64,
    pub temperature_c: f32,
    pub power_watts: Option<f32>,
    pub power_limit_watts: Option<f32>,
    /// First fan, if the board reports any
    pub fan_pct: Option<u32>,
    pub fan_speeds_pct: Vec<u32>,
    #[serde(skip)]
    pub sampled_at: Instant,
}

impl GpuSnapshot {
    /// VRAM usage as a percentage of the total (0 when the total is unknown).
    pub fn vram_pct(&self) -> f32 {
        if self.vram_total_bytes > 0 {
            (self.vram_used_bytes as f64 / self.vram_total_bytes as f64 * 100.0) as f32
        } else {
            0.0
        }
    }
}

/// Abstracted hardware access.
///
/// Implementations are called from the blocking pool, possibly for several
/// devices at once, so they must be `Send + Sync`.
pub trait TelemetryProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn list_devices(&self) -> Result<Vec<DeviceId>, TelemetryError>;

    fn read_device(&self, id: &DeviceId) -> Result<GpuSnapshot, DeviceReadError>;
}

/// Pick the telemetry backend once, at startup.
///
/// `read_timeout` bounds every nvidia-smi invocation; NVML calls do not take
/// a deadline.
pub fn select_provider(
    preference: ProviderPreference,
    read_timeout: Duration,
) -> Result<Arc<dyn TelemetryProvider>, TelemetryError> {
    match preference {
        ProviderPreference::Nvml => open_nvml(),
        ProviderPreference::Smi => open_smi(read_timeout),
        ProviderPreference::Auto => {
            let nvml_err = match open_nvml() {
                Ok(provider) => return Ok(provider),
                Err(e) => e,
            };
            log::info!("{nvml_err}; falling back to nvidia-smi");
            open_smi(read_timeout).map_err(|smi_err| {
                TelemetryError::NoProvider(format!("{nvml_err}; {smi_err}"))
            })
        }
    }
}

#[cfg(feature = "nvml")]
fn open_nvml() -> Result<Arc<dyn TelemetryProvider>, TelemetryError> {
    let provider = nvml::NvmlProvider::new()?;
    log::info!("Using NVML telemetry backend");
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "nvml"))]
fn open_nvml() -> Result<Arc<dyn TelemetryProvider>, TelemetryError> {
    Err(TelemetryError::ProviderInit {
        provider: "nvml",
        reason: "built without the `nvml` feature".to_string(),
    })
}

fn open_smi(deadline: Duration) -> Result<Arc<dyn TelemetryProvider>, TelemetryError> {
    let provider = smi::SmiProvider::new(deadline)?;
    log::info!("Using nvidia-smi telemetry backend");
    Ok(Arc::new(provider))
}
