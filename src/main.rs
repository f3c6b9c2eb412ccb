// SPDX-License-Identifier: MPL-2.0

//! Headless runner: samples the GPUs, runs the glow engine on a real 20 ms
//! timer and prints one status line per device after every sampling tick.
//!
//! ```text
//! gpu-glow [--config <path>] [--json]
//! ```

use chrono::Local;
use gpu_glow::config::CONFIG_ENV;
use gpu_glow::{
    Config, DeviceEvent, DeviceStatus, GpuMonitor, SamplingWorker, TelemetrySampler,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Default)]
struct Options {
    config_path: Option<PathBuf>,
    json: bool,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut options = Options::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => options.json = true,
                "--config" => {
                    let path = args.next().ok_or("--config needs a path")?;
                    options.config_path = Some(PathBuf::from(path));
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
        }
        if options.config_path.is_none() {
            options.config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        }
        Ok(options)
    }
}

#[derive(Serialize)]
struct StatusLine<'a> {
    time: String,
    devices: Vec<DeviceStatus<'a>>,
}

fn print_status(monitor: &GpuMonitor, json: bool) {
    let stamp = Local::now();

    if json {
        let line = StatusLine {
            time: stamp.to_rfc3339(),
            devices: monitor.status(),
        };
        match serde_json::to_string(&line) {
            Ok(text) => println!("{}", text),
            Err(e) => log::warn!("Failed to encode status: {}", e),
        }
        return;
    }

    if monitor.devices().is_empty() {
        println!("[{}] no GPUs", stamp.format("%H:%M:%S"));
        return;
    }

    for status in monitor.status() {
        let snap = status.snapshot;
        let gib = 1024.0 * 1024.0 * 1024.0;
        let power = snap
            .power_watts
            .map(|w| format!("{:.1} W", w))
            .unwrap_or_else(|| "-- W".to_string());
        let fan = snap
            .fan_pct
            .map(|f| format!("{}%", f))
            .unwrap_or_else(|| "--".to_string());
        let glow = status
            .color
            .map(|c| c.to_string())
            .unwrap_or_else(|| "off".to_string());

        println!(
            "[{}] GPU{} {} | util {}% | vram {:.1}/{:.1} GB | {:.0}°C | {} | fan {} | glow {}",
            stamp.format("%H:%M:%S"),
            snap.index,
            snap.name,
            snap.utilization_pct,
            snap.vram_used_bytes as f64 / gib,
            snap.vram_total_bytes as f64 / gib,
            snap.temperature_c,
            power,
            fan,
            glow
        );
    }
}

fn report(event: &DeviceEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
        return;
    }
    match event {
        DeviceEvent::Added { id, name } => println!("+ {} ({})", name, id),
        DeviceEvent::Removed { id } => println!("- {}", id),
        DeviceEvent::AnimationStarted { .. } | DeviceEvent::AnimationStopped { .. } => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::parse(std::env::args().skip(1))?;
    let config = match &options.config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // No backend means nothing can be monitored; bail out
    let sampler = TelemetrySampler::from_config(&config)?;
    let mut monitor = GpuMonitor::new(&config);
    let (worker, mut batches) = SamplingWorker::spawn(sampler, config.sample_interval());

    let mut frames = tokio::time::interval(config.animation_tick());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("Interrupted, shutting down");
                break;
            }
            _ = frames.tick() => {
                let now = Instant::now();
                if let Some(batch) = batches.take_latest() {
                    for event in monitor.ingest(&batch, now) {
                        report(&event, options.json);
                    }
                    print_status(&monitor, options.json);
                }
                monitor.tick(now);
            }
        }

        if worker.is_finished() {
            log::warn!("Sampling worker exited");
            break;
        }
    }

    worker.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_flags() {
        let options = Options::parse(args(&["--json", "--config", "/tmp/glow.json"])).unwrap();
        assert!(options.json);
        assert_eq!(options.config_path, Some(PathBuf::from("/tmp/glow.json")));
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Options::parse(args(&["--verbose"])).is_err());
    }

    #[test]
    fn config_needs_value() {
        assert!(Options::parse(args(&["--config"])).is_err());
    }
}
