// SPDX-License-Identifier: MPL-2.0

//! Per-GPU telemetry sampling with a temperature-driven color-cycling glow.
//!
//! Data flow:
//!
//! ```text
//! TelemetryProvider ─▶ TelemetrySampler ─▶ (SamplingWorker, watch) ─▶ GpuMonitor
//!                                                                     ├─ TemperatureTrendTracker
//!                                                                     ├─ AnimationController
//!                                                                     └─ interpolate() ─▶ UI
//! ```
//!
//! Sampling runs on its own task at one cadence (1 s), the glow animation on
//! the UI loop at another (20 ms). Only the batch hand-off crosses between them.

pub mod config;
pub mod error;
pub mod glow;
pub mod monitor;
pub mod scheduler;
pub mod telemetry;
pub mod worker;

pub use config::{Config, ProviderPreference};
pub use error::{ConfigError, DeviceReadError, TelemetryError};
pub use glow::{Phase, Rgb, TrendEvent};
pub use monitor::{DeviceEvent, DeviceStatus, GpuMonitor};
pub use telemetry::{DeviceId, GpuSnapshot, SampleBatch, TelemetryProvider, TelemetrySampler};
pub use worker::{BatchReceiver, SamplingWorker};
