// SPDX-License-Identifier: MPL-2.0

//! NVML backend via `nvml-wrapper`.
//!
//! Devices are looked up by UUID on every read, so a device that falls off the
//! bus turns into a read error instead of a stale handle.

use super::{DeviceId, GpuSnapshot, TelemetryProvider};
use crate::error::{DeviceReadError, TelemetryError};
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::{Device, Nvml};
use std::time::Instant;

pub struct NvmlProvider {
    nvml: Nvml,
}

impl NvmlProvider {
    /// Initialize the NVML library. Failure here is fatal for this backend.
    pub fn new() -> Result<Self, TelemetryError> {
        let nvml = Nvml::init().map_err(|e| TelemetryError::ProviderInit {
            provider: "nvml",
            reason: e.to_string(),
        })?;
        if let Ok(version) = nvml.sys_driver_version() {
            log::info!("NVML initialized, driver {}", version);
        }
        Ok(Self { nvml })
    }

    fn read(&self, device: &Device<'_>, id: &DeviceId) -> Result<GpuSnapshot, NvmlError> {
        let name = device.name().unwrap_or_else(|_| format!("GPU {}", id));
        let index = device.index()?;
        let utilization = device.utilization_rates()?;
        let memory = device.memory_info()?;
        let temperature = device.temperature(TemperatureSensor::Gpu)?;

        // Power and fans are missing on many boards (laptops, passively cooled cards)
        let power_watts = device.power_usage().ok().map(milliwatts_to_watts);
        let power_limit_watts = device.enforced_power_limit().ok().map(milliwatts_to_watts);
        let fan_speeds_pct = read_fans(device);

        Ok(GpuSnapshot {
            device_id: id.clone(),
            index,
            name,
            utilization_pct: utilization.gpu,
            memory_utilization_pct: utilization.memory,
            vram_used_bytes: memory.used,
            vram_total_bytes: memory.total,
            temperature_c: temperature as f32,
            power_watts,
            power_limit_watts,
            fan_pct: fan_speeds_pct.first().copied(),
            fan_speeds_pct,
            sampled_at: Instant::now(),
        })
    }
}

impl TelemetryProvider for NvmlProvider {
    fn name(&self) -> &'static str {
        "nvml"
    }

    fn list_devices(&self) -> Result<Vec<DeviceId>, TelemetryError> {
        let count = self
            .nvml
            .device_count()
            .map_err(|e| TelemetryError::ProviderInit {
                provider: "nvml",
                reason: e.to_string(),
            })?;

        let mut ids = Vec::with_capacity(count as usize);
        for i in 0..count {
            // A single broken device should not hide the others
            match self.nvml.device_by_index(i).and_then(|d| d.uuid()) {
                Ok(uuid) => ids.push(DeviceId::new(uuid)),
                Err(e) => log::warn!("Skipping NVML device {}: {}", i, e),
            }
        }
        Ok(ids)
    }

    fn read_device(&self, id: &DeviceId) -> Result<GpuSnapshot, DeviceReadError> {
        let device = self
            .nvml
            .device_by_uuid(id.as_str())
            .map_err(|e| DeviceReadError::Query(e.to_string()))?;
        self.read(&device, id)
            .map_err(|e| DeviceReadError::Query(e.to_string()))
    }
}

fn read_fans(device: &Device<'_>) -> Vec<u32> {
    match device.num_fans() {
        Ok(count) => (0..count)
            .filter_map(|fan| device.fan_speed(fan).ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn milliwatts_to_watts(mw: u32) -> f32 {
    mw as f32 / 1000.0
}
