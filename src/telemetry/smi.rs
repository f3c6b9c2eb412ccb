// SPDX-License-Identifier: MPL-2.0

//! nvidia-smi backend
//!
//! Runs one CSV query per device per tick:
//!
//! ```text
//! nvidia-smi --id=<uuid> --query-gpu=index,uuid,name,... --format=csv,noheader,nounits
//! ```
//!
//! Memory is reported in MiB. Unsupported fields come back as `[N/A]` or
//! `[Not Supported]`; those are fine for power and fan, fatal for the rest.

use super::{DeviceId, GpuSnapshot, TelemetryProvider};
use crate::error::{DeviceReadError, TelemetryError};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const SMI_BINARY: &str = "nvidia-smi";

const QUERY_FIELDS: &str = "index,uuid,name,utilization.gpu,utilization.memory,memory.used,\
memory.total,temperature.gpu,power.draw,power.limit,fan.speed";

const FIELD_COUNT: usize = 11;

const MIB: u64 = 1024 * 1024;

/// How often a running child is checked for exit.
const POLL_STEP: Duration = Duration::from_millis(10);

// ============================================================================
// Provider
// ============================================================================

/// Telemetry through the `nvidia-smi` command line tool.
///
/// Every invocation is bounded by `deadline`; a child that has not exited by
/// then is killed and reaped, so a wedged driver never piles up processes.
pub struct SmiProvider {
    binary: String,
    deadline: Duration,
}

impl SmiProvider {
    /// Check that nvidia-smi runs and can talk to the driver.
    pub fn new(deadline: Duration) -> Result<Self, TelemetryError> {
        Self::with_binary(SMI_BINARY, deadline)
    }

    pub fn with_binary(
        binary: impl Into<String>,
        deadline: Duration,
    ) -> Result<Self, TelemetryError> {
        let provider = Self {
            binary: binary.into(),
            deadline,
        };
        provider
            .query(&["-L"])
            .map_err(|reason| TelemetryError::ProviderInit {
                provider: "nvidia-smi",
                reason: format!("{}: {}", provider.binary, reason),
            })?;
        Ok(provider)
    }

    fn query(&self, args: &[&str]) -> Result<String, String> {
        let mut command = Command::new(&self.binary);
        command.args(args);
        run_with_deadline(&mut command, self.deadline)
    }
}

impl TelemetryProvider for SmiProvider {
    fn name(&self) -> &'static str {
        "nvidia-smi"
    }

    fn list_devices(&self) -> Result<Vec<DeviceId>, TelemetryError> {
        let stdout = self
            .query(&["--query-gpu=uuid", "--format=csv,noheader"])
            .map_err(|reason| TelemetryError::ProviderInit {
                provider: "nvidia-smi",
                reason,
            })?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(DeviceId::from)
            .collect())
    }

    fn read_device(&self, id: &DeviceId) -> Result<GpuSnapshot, DeviceReadError> {
        let id_arg = format!("--id={}", id);
        let query_arg = format!("--query-gpu={}", QUERY_FIELDS);
        let stdout = self
            .query(&[&id_arg, &query_arg, "--format=csv,noheader,nounits"])
            .map_err(DeviceReadError::Query)?;

        let line = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| DeviceReadError::Query("empty output".to_string()))?;

        parse_csv_line(line, Instant::now())
    }
}

// ============================================================================
// Process Handling
// ============================================================================

/// Run `command` to completion and return its stdout, or its stderr on a
/// non-zero exit. Past `deadline` the child is killed.
fn run_with_deadline(command: &mut Command, deadline: Duration) -> Result<String, String> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to run: {}", e))?;

    // Output is a few short lines, well within the pipe buffer
    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= deadline => {
                if let Err(e) = child.kill() {
                    log::warn!("Failed to kill nvidia-smi (pid {}): {}", child.id(), e);
                }
                let _ = child.wait();
                return Err(format!("no answer within {} ms", deadline.as_millis()));
            }
            Ok(None) => std::thread::sleep(POLL_STEP),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.to_string());
            }
        }
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_string(&mut stdout).map_err(|e| e.to_string())?;
    }
    if let Some(mut pipe) = child.stderr.take() {
        // Diagnostics only; undecodable stderr is not worth failing over
        let _ = pipe.read_to_string(&mut stderr);
    }

    if status.success() {
        Ok(stdout)
    } else {
        Err(stderr.trim().to_string())
    }
}

// ============================================================================
// CSV Parsing
// ============================================================================

/// Parse one `--format=csv,noheader,nounits` line in [`QUERY_FIELDS`] order.
pub fn parse_csv_line(line: &str, sampled_at: Instant) -> Result<GpuSnapshot, DeviceReadError> {
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if parts.len() < FIELD_COUNT {
        return Err(DeviceReadError::Malformed {
            field: "line",
            value: line.to_string(),
        });
    }

    let fan_pct = optional::<f32>(parts[10]).map(|f| f.round() as u32);

    Ok(GpuSnapshot {
        index: required(parts[0], "index")?,
        device_id: DeviceId::new(parts[1]),
        name: parts[2].to_string(),
        utilization_pct: required(parts[3], "utilization.gpu")?,
        memory_utilization_pct: required(parts[4], "utilization.memory")?,
        vram_used_bytes: mebibytes(parts[5], "memory.used")?,
        vram_total_bytes: mebibytes(parts[6], "memory.total")?,
        temperature_c: required(parts[7], "temperature.gpu")?,
        power_watts: optional(parts[8]),
        power_limit_watts: optional(parts[9]),
        fan_pct,
        fan_speeds_pct: fan_pct.into_iter().collect(),
        sampled_at,
    })
}

fn required<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, DeviceReadError> {
    value.parse().map_err(|_| DeviceReadError::Malformed {
        field,
        value: value.to_string(),
    })
}

/// MiB field converted to bytes.
fn mebibytes(value: &str, field: &'static str) -> Result<u64, DeviceReadError> {
    required::<u64>(value, field)?
        .checked_mul(MIB)
        .ok_or_else(|| DeviceReadError::Malformed {
            field,
            value: value.to_string(),
        })
}

/// `[N/A]`, `[Not Supported]` and friends all fail to parse and become `None`.
fn optional<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}
