// SPDX-License-Identifier: MPL-2.0

//! # GPU Monitor
//!
//! Consumer side of the engine. One [`GpuMonitor`] lives on the presentation
//! loop and is the only writer of per-device state:
//!
//! - [`GpuMonitor::ingest`] takes a [`SampleBatch`] from the sampling worker,
//!   runs trend detection and drives the animation state machines
//! - [`GpuMonitor::tick`] advances the color cycle on the animation cadence
//!
//! A device's history and animation state are created together on its first
//! snapshot and dropped together after `max_consecutive_failures` ticks in a
//! row without one.

use crate::config::Config;
use crate::glow::{AnimationController, Phase, Rgb, TemperatureTrendTracker, TrendThresholds};
use crate::scheduler::Cadence;
use crate::telemetry::{DeviceId, GpuSnapshot, SampleBatch};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

// ============================================================================
// Events
// ============================================================================

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    Added { id: DeviceId, name: String },
    Removed { id: DeviceId },
    AnimationStarted { id: DeviceId },
    AnimationStopped { id: DeviceId },
}

/// What the UI needs to draw one device card.
#[derive(Debug, Serialize)]
pub struct DeviceStatus<'a> {
    #[serde(flatten)]
    pub snapshot: &'a GpuSnapshot,
    pub animating: bool,
    /// Glow color, only while animating
    pub color: Option<Rgb>,
}

// ============================================================================
// Monitor
// ============================================================================

/// Per-device telemetry, trend and glow state, kept in step.
///
/// Owned by the presentation loop and fed from the
/// [`SamplingWorker`](crate::worker::SamplingWorker) hand-off.
pub struct GpuMonitor {
    tracker: TemperatureTrendTracker,
    animation: AnimationController,
    latest: HashMap<DeviceId, GpuSnapshot>,
    /// Known devices in order of first sighting
    order: Vec<DeviceId>,
    failures: HashMap<DeviceId, u32>,
    max_failures: u32,
    frame: Cadence,
}

impl GpuMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            tracker: TemperatureTrendTracker::new(TrendThresholds::from(config)),
            animation: AnimationController::from_config(config),
            latest: HashMap::new(),
            order: Vec::new(),
            failures: HashMap::new(),
            max_failures: config.max_consecutive_failures.max(1),
            frame: Cadence::new(config.animation_tick()),
        }
    }

    /// Apply one sampling batch. Known devices missing from it count as a
    /// failed read.
    pub fn ingest(&mut self, batch: &SampleBatch, now: Instant) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        let mut seen = HashSet::new();

        for snapshot in &batch.snapshots {
            let id = &snapshot.device_id;
            if !seen.insert(id.clone()) {
                log::debug!("Duplicate snapshot for {} ignored", id);
                continue;
            }
            self.failures.remove(id);

            if !self.latest.contains_key(id) {
                self.add_device(snapshot);
                events.push(DeviceEvent::Added {
                    id: id.clone(),
                    name: snapshot.name.clone(),
                });
                continue;
            }

            let phase = self.animation.phase(id).unwrap_or_default();
            let trend = self.tracker.ingest(snapshot, phase);
            match self.animation.apply(id, trend, now) {
                Some(Phase::Active) => {
                    log::info!(
                        "{} ({}) heating up at {:.0}°C, starting glow",
                        snapshot.name,
                        id,
                        snapshot.temperature_c
                    );
                    events.push(DeviceEvent::AnimationStarted { id: id.clone() });
                }
                Some(Phase::Idle) => {
                    log::info!(
                        "{} ({}) cooling down at {:.0}°C, stopping glow",
                        snapshot.name,
                        id,
                        snapshot.temperature_c
                    );
                    events.push(DeviceEvent::AnimationStopped { id: id.clone() });
                }
                None => {}
            }
            self.latest.insert(id.clone(), snapshot.clone());
        }

        for (id, err) in &batch.failures {
            log::warn!("Failed to read {}: {}", id, err);
        }

        let missing: Vec<DeviceId> = self
            .order
            .iter()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in missing {
            let count = self.failures.entry(id.clone()).or_insert(0);
            *count += 1;
            if *count >= self.max_failures {
                log::warn!("{} missed {} reads in a row, dropping it", id, count);
                self.remove_device(&id);
                events.push(DeviceEvent::Removed { id });
            }
        }

        events
    }

    /// Animation cadence hook. Advances the color cycle at most once per due
    /// tick; returns true when a frame was produced.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.frame.poll(now) {
            return false;
        }
        self.animation.tick();
        true
    }

    pub fn latest_snapshot(&self, id: &DeviceId) -> Option<&GpuSnapshot> {
        self.latest.get(id)
    }

    pub fn is_animating(&self, id: &DeviceId) -> bool {
        self.animation.is_animating(id)
    }

    pub fn current_color(&self, id: &DeviceId) -> Option<Rgb> {
        self.animation.current_color(id)
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.order
    }

    pub fn failure_count(&self, id: &DeviceId) -> u32 {
        self.failures.get(id).copied().unwrap_or(0)
    }

    pub fn tracker(&self) -> &TemperatureTrendTracker {
        &self.tracker
    }

    pub fn animation(&self) -> &AnimationController {
        &self.animation
    }

    /// Per-device view for the UI, in device order.
    pub fn status(&self) -> Vec<DeviceStatus<'_>> {
        self.order
            .iter()
            .filter_map(|id| {
                let snapshot = self.latest.get(id)?;
                let animating = self.animation.is_animating(id);
                Some(DeviceStatus {
                    snapshot,
                    animating,
                    color: if animating {
                        self.animation.current_color(id)
                    } else {
                        None
                    },
                })
            })
            .collect()
    }

    fn add_device(&mut self, snapshot: &GpuSnapshot) {
        let id = snapshot.device_id.clone();
        log::info!(
            "New GPU {} ({}) at {:.0}°C",
            snapshot.name,
            id,
            snapshot.temperature_c
        );
        self.tracker.track(id.clone(), snapshot.temperature_c);
        self.animation.track(id.clone());
        self.latest.insert(id.clone(), snapshot.clone());
        self.order.push(id);
    }

    fn remove_device(&mut self, id: &DeviceId) {
        self.tracker.forget(id);
        self.animation.forget(id);
        self.latest.remove(id);
        self.failures.remove(id);
        self.order.retain(|known| known != id);
    }
}
