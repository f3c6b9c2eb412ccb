// SPDX-License-Identifier: MPL-2.0

//! Per-device color cycling state machine.
//!
//! ```text
//!          Rise
//!   Idle ───────▶ Active ──┐ tick: angle += step (mod 2π)
//!    ▲              │  ◀───┘
//!    └──────────────┘
//!          Fall
//! ```
//!
//! The angle is never reset. It freezes when the device goes idle and the next
//! activation resumes from there; a device's first activation starts at 0.

use super::color::{Rgb, interpolate};
use super::trend::TrendEvent;
use crate::config::Config;
use crate::telemetry::DeviceId;
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

// ============================================================================
// State
// ============================================================================

/// Whether a device's glow is cycling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Active,
}

/// Animation state of one device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationState {
    pub phase: Phase,
    /// Position on the color wheel, radians in [0, 2π)
    pub color_angle: f64,
    pub last_transition_at: Option<Instant>,
}

// ============================================================================
// Controller
// ============================================================================

/// Phases and color angles of every known device, advanced together on each
/// animation tick.
#[derive(Debug)]
pub struct AnimationController {
    angular_step: f64,
    states: HashMap<DeviceId, AnimationState>,
}

impl AnimationController {
    /// `tick` is the animation frame period; one full revolution takes
    /// `cycle_period`.
    pub fn new(tick: Duration, cycle_period: Duration) -> Self {
        let angular_step = if cycle_period.is_zero() {
            0.0
        } else {
            TAU * tick.as_secs_f64() / cycle_period.as_secs_f64()
        };
        Self {
            angular_step,
            states: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.animation_tick(), config.cycle_period())
    }

    /// Radians advanced per tick.
    pub fn angular_step(&self) -> f64 {
        self.angular_step
    }

    pub fn track(&mut self, id: DeviceId) -> bool {
        if self.states.contains_key(&id) {
            return false;
        }
        self.states.insert(id, AnimationState::default());
        true
    }

    pub fn forget(&mut self, id: &DeviceId) -> bool {
        self.states.remove(id).is_some()
    }

    pub fn state(&self, id: &DeviceId) -> Option<&AnimationState> {
        self.states.get(id)
    }

    pub fn phase(&self, id: &DeviceId) -> Option<Phase> {
        self.states.get(id).map(|s| s.phase)
    }

    pub fn color_angle(&self, id: &DeviceId) -> Option<f64> {
        self.states.get(id).map(|s| s.color_angle)
    }

    pub fn is_animating(&self, id: &DeviceId) -> bool {
        self.phase(id) == Some(Phase::Active)
    }

    /// Color for the device's current angle, `None` for unknown devices.
    pub fn current_color(&self, id: &DeviceId) -> Option<Rgb> {
        self.color_angle(id).map(interpolate)
    }

    /// Feed a trend event. Returns the new phase if a transition happened.
    pub fn apply(&mut self, id: &DeviceId, event: TrendEvent, now: Instant) -> Option<Phase> {
        let state = self.states.get_mut(id)?;
        let next = match (state.phase, event) {
            (Phase::Idle, TrendEvent::Rise) => Phase::Active,
            (Phase::Active, TrendEvent::Fall) => Phase::Idle,
            _ => return None,
        };
        state.phase = next;
        state.last_transition_at = Some(now);
        Some(next)
    }

    /// Advance every active device by one step. Returns how many moved.
    pub fn tick(&mut self) -> usize {
        let step = self.angular_step;
        let mut advanced = 0;
        for state in self.states.values_mut() {
            if state.phase == Phase::Active {
                state.color_angle = (state.color_angle + step).rem_euclid(TAU);
                advanced += 1;
            }
        }
        advanced
    }
}
