// SPDX-License-Identifier: MPL-2.0

//! Temperature-driven glow: trend detection, animation state and colors.

pub mod animation;
pub mod color;
pub mod trend;

pub use animation::{AnimationController, AnimationState, Phase};
pub use color::{Rgb, interpolate};
pub use trend::{TemperatureHistory, TemperatureTrendTracker, TrendEvent, TrendThresholds};
