// SPDX-License-Identifier: MPL-2.0

//! In-memory telemetry backend with scripted readings.

#![allow(dead_code)]

use gpu_glow::{DeviceId, DeviceReadError, GpuSnapshot, TelemetryError, TelemetryProvider};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum Step {
    Temp(f32),
    Fail,
    /// Block the reading thread, then report the temperature
    Hang(Duration, f32),
}

/// Each device replays its script; once exhausted it keeps reporting
/// `idle_temp`.
pub struct ScriptedProvider {
    devices: Vec<DeviceId>,
    scripts: Mutex<HashMap<DeviceId, VecDeque<Step>>>,
    idle_temp: f32,
}

impl ScriptedProvider {
    pub fn new(devices: &[&str]) -> Self {
        Self {
            devices: devices.iter().map(|d| DeviceId::from(*d)).collect(),
            scripts: Mutex::new(HashMap::new()),
            idle_temp: 45.0,
        }
    }

    pub fn script(self, device: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(DeviceId::from(device), steps.into());
        self
    }
}

impl TelemetryProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn list_devices(&self) -> Result<Vec<DeviceId>, TelemetryError> {
        Ok(self.devices.clone())
    }

    fn read_device(&self, id: &DeviceId) -> Result<GpuSnapshot, DeviceReadError> {
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Temp(self.idle_temp));

        match step {
            Step::Temp(t) => Ok(snapshot(id.as_str(), t)),
            Step::Fail => Err(DeviceReadError::Query("scripted failure".to_string())),
            Step::Hang(duration, t) => {
                std::thread::sleep(duration);
                Ok(snapshot(id.as_str(), t))
            }
        }
    }
}

/// A provider whose backend never came up.
pub struct BrokenProvider;

impl TelemetryProvider for BrokenProvider {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn list_devices(&self) -> Result<Vec<DeviceId>, TelemetryError> {
        Err(TelemetryError::ProviderInit {
            provider: "broken",
            reason: "driver not loaded".to_string(),
        })
    }

    fn read_device(&self, _id: &DeviceId) -> Result<GpuSnapshot, DeviceReadError> {
        Err(DeviceReadError::Query("driver not loaded".to_string()))
    }
}

pub fn snapshot(id: &str, temperature_c: f32) -> GpuSnapshot {
    GpuSnapshot {
        device_id: DeviceId::from(id),
        index: 0,
        name: format!("Test GPU {}", id),
        utilization_pct: 50,
        memory_utilization_pct: 10,
        vram_used_bytes: 1 << 30,
        vram_total_bytes: 8 << 30,
        temperature_c,
        power_watts: Some(120.0),
        power_limit_watts: Some(250.0),
        fan_pct: Some(40),
        fan_speeds_pct: vec![40, 42],
        sampled_at: Instant::now(),
    }
}
