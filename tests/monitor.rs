// SPDX-License-Identifier: MPL-2.0

mod common;

use common::snapshot;
use gpu_glow::{Config, DeviceEvent, DeviceId, GpuMonitor, Phase, Rgb, SampleBatch};
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(20);

fn batch(readings: &[(&str, f32)]) -> SampleBatch {
    SampleBatch::new(
        readings.iter().map(|(id, t)| snapshot(id, *t)).collect(),
        Instant::now(),
    )
}

fn feed(monitor: &mut GpuMonitor, id: &str, temps: &[f32]) -> Vec<DeviceEvent> {
    let now = Instant::now();
    temps
        .iter()
        .flat_map(|t| monitor.ingest(&batch(&[(id, *t)]), now))
        .collect()
}

fn started(id: &str) -> DeviceEvent {
    DeviceEvent::AnimationStarted {
        id: DeviceId::from(id),
    }
}

fn stopped(id: &str) -> DeviceEvent {
    DeviceEvent::AnimationStopped {
        id: DeviceId::from(id),
    }
}

/// Drive the animation cadence for `frames` frames starting at `start`.
fn run_frames(monitor: &mut GpuMonitor, start: Instant, frames: u32) -> Instant {
    let mut now = start;
    for _ in 0..frames {
        assert!(monitor.tick(now));
        now += FRAME;
    }
    now
}

#[test]
fn first_sighting_adds_device() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let events = monitor.ingest(&batch(&[("GPU-A", 55.0)]), Instant::now());

    assert_eq!(
        events,
        vec![DeviceEvent::Added {
            id: DeviceId::from("GPU-A"),
            name: "Test GPU GPU-A".to_string()
        }]
    );
    let id = DeviceId::from("GPU-A");
    assert_eq!(monitor.devices(), &[id.clone()]);
    assert_eq!(monitor.latest_snapshot(&id).unwrap().temperature_c, 55.0);
    assert!(!monitor.is_animating(&id));
    assert_eq!(monitor.tracker().history(&id).unwrap().base_temperature(), 55.0);
    assert_eq!(monitor.animation().phase(&id), Some(Phase::Idle));
}

#[test]
fn gradual_climb_starts_glow() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let events = feed(&mut monitor, "GPU-A", &[60.0, 62.0, 64.0]);
    assert_eq!(events.len(), 1, "only the Added event so far: {:?}", events);

    let events = feed(&mut monitor, "GPU-A", &[66.0]);
    assert_eq!(events, vec![started("GPU-A")]);

    let id = DeviceId::from("GPU-A");
    assert!(monitor.is_animating(&id));
    assert_eq!(monitor.current_color(&id), Some(Rgb::new(255, 0, 0)));
}

#[test]
fn sudden_jump_starts_glow() {
    let mut monitor = GpuMonitor::new(&Config::default());
    feed(&mut monitor, "GPU-A", &[60.0]);
    assert_eq!(feed(&mut monitor, "GPU-A", &[63.0]), vec![started("GPU-A")]);
}

#[test]
fn small_wobble_never_starts_glow() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let events = feed(&mut monitor, "GPU-A", &[60.0, 61.0, 60.0, 62.0, 61.0, 62.0, 60.0]);
    assert_eq!(events.len(), 1);
    assert!(!monitor.is_animating(&DeviceId::from("GPU-A")));
}

#[test]
fn cooling_stops_glow_and_freezes_angle() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let id = DeviceId::from("GPU-A");
    feed(&mut monitor, "GPU-A", &[60.0, 68.0]);
    assert!(monitor.is_animating(&id));

    let t0 = Instant::now();
    let t = run_frames(&mut monitor, t0, 30);
    let step = monitor.animation().angular_step();
    let angle = monitor.animation().color_angle(&id).unwrap();
    assert!((angle - 30.0 * step).abs() < 1e-9);

    // 68 -> 67 -> 65 -> 63: five degrees below the activation point
    let events = feed(&mut monitor, "GPU-A", &[67.0, 65.0]);
    assert!(events.is_empty());
    assert_eq!(feed(&mut monitor, "GPU-A", &[63.0]), vec![stopped("GPU-A")]);
    assert!(!monitor.is_animating(&id));

    let t = run_frames(&mut monitor, t, 10);
    assert_eq!(monitor.animation().color_angle(&id), Some(angle));

    // Resume where it stopped
    assert_eq!(feed(&mut monitor, "GPU-A", &[67.0]), vec![started("GPU-A")]);
    assert_eq!(monitor.animation().color_angle(&id), Some(angle));
    run_frames(&mut monitor, t, 1);
    let resumed = monitor.animation().color_angle(&id).unwrap();
    assert!((resumed - (angle + step)).abs() < 1e-9);
}

#[test]
fn sudden_drop_stops_glow() {
    let mut monitor = GpuMonitor::new(&Config::default());
    feed(&mut monitor, "GPU-A", &[60.0, 68.0]);
    assert_eq!(feed(&mut monitor, "GPU-A", &[64.0]), vec![stopped("GPU-A")]);
}

#[test]
fn animation_cadence_skips_early_ticks() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let id = DeviceId::from("GPU-A");
    feed(&mut monitor, "GPU-A", &[60.0, 65.0]);

    let t0 = Instant::now();
    assert!(monitor.tick(t0));
    assert!(!monitor.tick(t0 + Duration::from_millis(5)));
    assert!(!monitor.tick(t0 + Duration::from_millis(19)));
    let step = monitor.animation().angular_step();
    assert!((monitor.animation().color_angle(&id).unwrap() - step).abs() < 1e-12);
}

#[test]
fn three_missed_reads_remove_device_once() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let id = DeviceId::from("GPU-A");
    feed(&mut monitor, "GPU-A", &[60.0]);

    let empty = batch(&[]);
    let now = Instant::now();
    assert!(monitor.ingest(&empty, now).is_empty());
    assert!(monitor.ingest(&empty, now).is_empty());
    assert_eq!(monitor.failure_count(&id), 2);
    assert!(monitor.latest_snapshot(&id).is_some());

    assert_eq!(
        monitor.ingest(&empty, now),
        vec![DeviceEvent::Removed { id: id.clone() }]
    );
    assert!(monitor.latest_snapshot(&id).is_none());
    assert!(monitor.tracker().history(&id).is_none());
    assert!(monitor.animation().state(&id).is_none());
    assert!(monitor.devices().is_empty());

    for _ in 0..5 {
        assert!(monitor.ingest(&empty, now).is_empty());
    }
}

#[test]
fn recovery_resets_failure_count() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let id = DeviceId::from("GPU-A");
    feed(&mut monitor, "GPU-A", &[60.0]);

    let empty = batch(&[]);
    let now = Instant::now();
    monitor.ingest(&empty, now);
    monitor.ingest(&empty, now);
    feed(&mut monitor, "GPU-A", &[60.0]);
    assert_eq!(monitor.failure_count(&id), 0);

    monitor.ingest(&empty, now);
    monitor.ingest(&empty, now);
    assert!(monitor.latest_snapshot(&id).is_some());
}

#[test]
fn failures_are_isolated_per_device() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let a = DeviceId::from("GPU-A");
    let b = DeviceId::from("GPU-B");
    let now = Instant::now();

    monitor.ingest(&batch(&[("GPU-A", 60.0), ("GPU-B", 50.0)]), now);
    let events = monitor.ingest(&batch(&[("GPU-A", 60.0), ("GPU-B", 56.0)]), now);
    assert_eq!(events, vec![started("GPU-B")]);

    let mut removed = Vec::new();
    for _ in 0..3 {
        removed.extend(monitor.ingest(&batch(&[("GPU-B", 56.0)]), now));
    }
    assert_eq!(removed, vec![DeviceEvent::Removed { id: a.clone() }]);
    assert!(monitor.is_animating(&b));
    assert_eq!(monitor.devices(), &[b.clone()]);
}

#[test]
fn reappearing_device_starts_fresh() {
    let mut monitor = GpuMonitor::new(&Config::default());
    let id = DeviceId::from("GPU-A");
    feed(&mut monitor, "GPU-A", &[60.0, 65.0]);
    run_frames(&mut monitor, Instant::now(), 5);

    let empty = batch(&[]);
    for _ in 0..3 {
        monitor.ingest(&empty, Instant::now());
    }
    let events = feed(&mut monitor, "GPU-A", &[70.0]);
    assert!(matches!(events.as_slice(), [DeviceEvent::Added { .. }]));
    assert_eq!(monitor.animation().color_angle(&id), Some(0.0));
    assert!(!monitor.is_animating(&id));
}

#[test]
fn no_devices_is_a_valid_state() {
    let mut monitor = GpuMonitor::new(&Config::default());
    assert!(monitor.ingest(&batch(&[]), Instant::now()).is_empty());
    assert!(monitor.devices().is_empty());
    assert!(monitor.status().is_empty());
    assert!(!monitor.is_animating(&DeviceId::from("GPU-A")));
    assert_eq!(monitor.current_color(&DeviceId::from("GPU-A")), None);
}

#[test]
fn status_reports_color_only_while_animating() {
    let mut monitor = GpuMonitor::new(&Config::default());
    feed(&mut monitor, "GPU-A", &[60.0]);
    let json = serde_json::to_value(monitor.status()).unwrap();
    assert_eq!(json[0]["device_id"], "GPU-A");
    assert_eq!(json[0]["animating"], false);
    assert!(json[0]["color"].is_null());
    assert_eq!(json[0]["temperature_c"], 60.0);

    feed(&mut monitor, "GPU-A", &[64.0]);
    let json = serde_json::to_value(monitor.status()).unwrap();
    assert_eq!(json[0]["animating"], true);
    assert_eq!(json[0]["color"], "#ff0000");
}
