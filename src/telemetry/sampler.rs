// SPDX-License-Identifier: MPL-2.0

//! Periodic hardware poll.
//!
//! Each call to [`TelemetrySampler::sample`] reads every known device on the
//! blocking pool, all devices concurrently, each bounded by the read timeout.
//! A device that fails or hangs is left out of the batch; the others are
//! unaffected.
//!
//! A read that times out keeps its blocking thread until the backend returns.
//! Each device has an in-flight flag, and while it is set the device is
//! reported [`DeviceReadError::Busy`] instead of getting another read. A
//! device that never answers holds at most one thread.

use super::{DeviceId, GpuSnapshot, TelemetryProvider, select_provider};
use crate::config::Config;
use crate::error::{DeviceReadError, TelemetryError};
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// ============================================================================
// Sample Batch
// ============================================================================

/// Result of one sampling tick.
#[derive(Debug, Clone)]
pub struct SampleBatch {
    /// Successful readings, in device enumeration order.
    pub snapshots: Vec<GpuSnapshot>,
    /// Devices omitted this tick and why.
    pub failures: Vec<(DeviceId, DeviceReadError)>,
    pub sampled_at: Instant,
}

impl SampleBatch {
    pub fn new(snapshots: Vec<GpuSnapshot>, sampled_at: Instant) -> Self {
        Self {
            snapshots,
            failures: Vec::new(),
            sampled_at,
        }
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Reads every enumerated device once per call, through the selected backend.
pub struct TelemetrySampler {
    provider: Arc<dyn TelemetryProvider>,
    devices: Vec<DeviceId>,
    /// Same order as `devices`
    in_flight: Vec<Arc<AtomicBool>>,
    read_timeout: Duration,
}

/// Clears a device's in-flight flag when its blocking read returns or unwinds.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TelemetrySampler {
    /// Enumerate devices once. Zero devices is a valid, empty setup.
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        read_timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let devices = provider.list_devices()?;
        if devices.is_empty() {
            log::info!("{} reports no GPUs; nothing to monitor", provider.name());
        } else {
            log::info!("{} reports {} GPU(s)", provider.name(), devices.len());
            for id in &devices {
                log::debug!("  {}", id);
            }
        }

        let in_flight = devices.iter().map(|_| Arc::new(AtomicBool::new(false))).collect();
        Ok(Self {
            provider,
            devices,
            in_flight,
            read_timeout,
        })
    }

    /// Select the backend from config and enumerate devices.
    pub fn from_config(config: &Config) -> Result<Self, TelemetryError> {
        let provider = select_provider(config.provider, config.read_timeout())?;
        Self::new(provider, config.read_timeout())
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Read every device once.
    pub async fn sample(&self) -> SampleBatch {
        let timeout = self.read_timeout;
        let reads = self.devices.iter().zip(&self.in_flight).map(|(id, flag)| {
            let id = id.clone();
            let flag = Arc::clone(flag);
            let provider = Arc::clone(&self.provider);
            async move {
                if flag.swap(true, Ordering::AcqRel) {
                    return (id, Err(DeviceReadError::Busy));
                }
                let guard = InFlight(flag);
                let read_id = id.clone();
                let task = tokio::task::spawn_blocking(move || {
                    let _guard = guard;
                    provider.read_device(&read_id)
                });
                // On timeout the blocking read is abandoned, not cancelled
                let result = match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => Err(DeviceReadError::Aborted(join_err.to_string())),
                    Err(_) => Err(DeviceReadError::Timeout(timeout.as_millis() as u64)),
                };
                (id, result)
            }
        });

        let mut batch = SampleBatch::new(Vec::new(), Instant::now());
        for (id, result) in join_all(reads).await {
            match result {
                Ok(snapshot) => batch.snapshots.push(snapshot),
                Err(e) => {
                    log::debug!("Read of {} failed: {}", id, e);
                    batch.failures.push((id, e));
                }
            }
        }
        batch.sampled_at = Instant::now();
        batch
    }
}
