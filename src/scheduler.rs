// SPDX-License-Identifier: MPL-2.0

//! Fixed-cadence scheduling driven by caller-supplied timestamps.
//!
//! Production code feeds `Instant::now()` from a real timer; tests feed
//! synthetic instants and never sleep.

use std::time::{Duration, Instant};

/// Tick decision for one fixed interval.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Returns true when a tick is due at `now`. The first poll always fires.
    ///
    /// Fires at most once per call. After a stall longer than one interval
    /// the schedule restarts from `now` instead of replaying missed ticks.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now < due => false,
            Some(due) => {
                let next = due + self.interval;
                self.next_due = Some(if next <= now { now + self.interval } else { next });
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }
}
