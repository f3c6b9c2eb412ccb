// SPDX-License-Identifier: MPL-2.0

//! # Temperature Trend Detection
//!
//! Classifies each new temperature sample of a device as a [`TrendEvent`].
//! The rules differ by animation phase, which is what gives the hysteresis:
//!
//! - **Idle**: `Rise` when the temperature climbed at least `rise_c` above the
//!   base *and* the recent deltas form a continuous climb, or when a single
//!   tick jumped by `sudden_c` or more.
//! - **Active**: `Fall`, symmetric, measured downward from the base.
//!
//! A continuous climb means the deltas in the window add up to at least the
//! threshold and none of them dips below `-tolerance_c`.
//!
//! ## Base Temperature
//!
//! While idle and flat (`|delta| < flat_band_c`, no event) the base follows the
//! current temperature, so slow ambient drift never accumulates into a trigger.
//! When an event fires the history is rebased at the trigger temperature and
//! the delta window is cleared; the opposite transition is then measured from
//! where the animation started or stopped. Nothing else moves the base.

use super::animation::Phase;
use crate::config::Config;
use crate::telemetry::{DeviceId, GpuSnapshot};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::collections::hash_map::Entry;

// ============================================================================
// Events and Thresholds
// ============================================================================

/// Classification of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendEvent {
    Rise,
    Fall,
    None,
}

/// Thresholds in degrees Celsius, plus the delta window length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendThresholds {
    pub rise_c: f32,
    pub fall_c: f32,
    pub sudden_c: f32,
    pub tolerance_c: f32,
    pub flat_band_c: f32,
    pub window: usize,
}

impl From<&Config> for TrendThresholds {
    fn from(config: &Config) -> Self {
        Self {
            rise_c: config.rise_threshold_c,
            fall_c: config.fall_threshold_c,
            sudden_c: config.sudden_delta_c,
            tolerance_c: config.trend_tolerance_c,
            flat_band_c: config.flat_band_c,
            window: config.trend_window.max(1),
        }
    }
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

// ============================================================================
// Per-Device History
// ============================================================================

/// Short temperature history of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureHistory {
    base_temperature: f32,
    last_temperature: f32,
    recent_deltas: VecDeque<f32>,
    capacity: usize,
}

impl TemperatureHistory {
    fn new(temperature: f32, capacity: usize) -> Self {
        Self {
            base_temperature: temperature,
            last_temperature: temperature,
            recent_deltas: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn base_temperature(&self) -> f32 {
        self.base_temperature
    }

    pub fn last_temperature(&self) -> f32 {
        self.last_temperature
    }

    /// Oldest first.
    pub fn recent_deltas(&self) -> impl Iterator<Item = f32> + '_ {
        self.recent_deltas.iter().copied()
    }

    fn push_delta(&mut self, delta: f32) {
        if self.recent_deltas.len() == self.capacity {
            self.recent_deltas.pop_front();
        }
        self.recent_deltas.push_back(delta);
    }

    fn delta_sum(&self) -> f32 {
        self.recent_deltas.iter().sum()
    }

    fn rebase(&mut self, temperature: f32) {
        self.base_temperature = temperature;
        self.recent_deltas.clear();
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Owns the [`TemperatureHistory`] of every known device.
#[derive(Debug, Default)]
pub struct TemperatureTrendTracker {
    thresholds: TrendThresholds,
    histories: HashMap<DeviceId, TemperatureHistory>,
}

impl TemperatureTrendTracker {
    pub fn new(thresholds: TrendThresholds) -> Self {
        Self {
            thresholds,
            histories: HashMap::new(),
        }
    }

    /// Start tracking a device at `temperature`. Returns false if it was
    /// already tracked (the existing history is kept).
    pub fn track(&mut self, id: DeviceId, temperature: f32) -> bool {
        match self.histories.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(TemperatureHistory::new(temperature, self.thresholds.window));
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn forget(&mut self, id: &DeviceId) -> bool {
        self.histories.remove(id).is_some()
    }

    pub fn history(&self, id: &DeviceId) -> Option<&TemperatureHistory> {
        self.histories.get(id)
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Classify `snapshot` given the device's current animation phase.
    ///
    /// The first sample of an unknown device only seeds its history.
    pub fn ingest(&mut self, snapshot: &GpuSnapshot, phase: Phase) -> TrendEvent {
        let temperature = snapshot.temperature_c;
        let th = self.thresholds;

        let history = match self.histories.entry(snapshot.device_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(TemperatureHistory::new(temperature, th.window));
                return TrendEvent::None;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        let delta = temperature - history.last_temperature;
        history.push_delta(delta);

        let sudden_rise = delta >= th.sudden_c;
        let sudden_fall = delta <= -th.sudden_c;

        let sum = history.delta_sum();
        let continuous_rise =
            sum >= th.rise_c && history.recent_deltas.iter().all(|d| *d >= -th.tolerance_c);
        let continuous_fall =
            sum <= -th.fall_c && history.recent_deltas.iter().all(|d| *d <= th.tolerance_c);

        let base = history.base_temperature;
        let event = match phase {
            Phase::Idle if (temperature - base >= th.rise_c && continuous_rise) || sudden_rise => {
                TrendEvent::Rise
            }
            Phase::Active if (base - temperature >= th.fall_c && continuous_fall) || sudden_fall => {
                TrendEvent::Fall
            }
            _ => TrendEvent::None,
        };

        history.last_temperature = temperature;
        match event {
            TrendEvent::None => {
                if phase == Phase::Idle && delta.abs() < th.flat_band_c {
                    history.base_temperature = temperature;
                }
            }
            TrendEvent::Rise | TrendEvent::Fall => history.rebase(temperature),
        }

        log::debug!(
            "{}: {:.1}°C delta {:+.1} base {:.1} sum {:+.1} -> {:?}",
            snapshot.device_id,
            temperature,
            delta,
            history.base_temperature,
            sum,
            event
        );
        event
    }
}
