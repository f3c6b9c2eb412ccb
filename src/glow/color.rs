// SPDX-License-Identifier: MPL-2.0

//! Seven-stop color wheel.
//!
//! Anchors sit 2π/7 apart starting with red at angle 0:
//!
//! ```text
//!   red → orange → yellow → green → cyan → blue → purple → (red)
//! ```
//!
//! Each channel is interpolated linearly between the two anchors that bracket
//! the angle, so the cycle has no seams, including at the wrap from purple
//! back to red.

use serde::{Serialize, Serializer};
use std::f64::consts::TAU;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub const ANCHORS: [Rgb; 7] = [
    Rgb::new(255, 0, 0),   // red
    Rgb::new(255, 127, 0), // orange
    Rgb::new(255, 255, 0), // yellow
    Rgb::new(0, 255, 0),   // green
    Rgb::new(0, 255, 255), // cyan
    Rgb::new(0, 0, 255),   // blue
    Rgb::new(127, 0, 255), // purple
];

/// Angular distance between neighbouring anchors.
pub const ANCHOR_SPACING: f64 = TAU / ANCHORS.len() as f64;

/// Map a phase angle in radians to a color. Any finite angle is accepted and
/// reduced modulo 2π; non-finite input yields the first anchor.
pub fn interpolate(angle: f64) -> Rgb {
    if !angle.is_finite() {
        return ANCHORS[0];
    }

    let position = angle.rem_euclid(TAU) / ANCHOR_SPACING;
    let base = position.floor();
    let fraction = position - base;
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    let index = (base as usize) % ANCHORS.len();
    let from = ANCHORS[index];
    let to = ANCHORS[(index + 1) % ANCHORS.len()];

    Rgb::new(
        lerp(from.r, to.r, fraction),
        lerp(from.g, to.g, fraction),
        lerp(from.b, to.b, fraction),
    )
}

fn lerp(from: u8, to: u8, t: f64) -> u8 {
    let value = from as f64 + (to as f64 - from as f64) * t;
    value.round().clamp(0.0, 255.0) as u8
}
