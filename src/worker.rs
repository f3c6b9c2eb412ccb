// SPDX-License-Identifier: MPL-2.0

//! Background sampling task.
//!
//! The worker owns the [`TelemetrySampler`] and runs it on its own tokio task
//! so slow hardware queries never touch the animation loop. Batches go through
//! a single-slot `watch` channel: the consumer always sees the newest batch
//! and older unread ones are overwritten.

use crate::telemetry::{SampleBatch, TelemetrySampler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct SamplingWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Consumer end of the hand-off.
pub struct BatchReceiver {
    rx: watch::Receiver<Option<Arc<SampleBatch>>>,
}

impl SamplingWorker {
    /// Spawn on the current tokio runtime. The first sample is taken right away.
    pub fn spawn(sampler: TelemetrySampler, interval: Duration) -> (Self, BatchReceiver) {
        let (batch_tx, batch_rx) = watch::channel(None);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            log::info!(
                "Sampling {} device(s) via {} every {:?}",
                sampler.devices().len(),
                sampler.provider_name(),
                interval
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                // A dropped sender counts as a stop request too
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let batch = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    batch = sampler.sample() => batch,
                };

                if *shutdown_rx.borrow() {
                    break;
                }
                if batch_tx.send(Some(Arc::new(batch))).is_err() {
                    log::debug!("Batch consumer gone");
                    break;
                }
            }
            log::info!("Sampling worker stopped");
        });

        (
            Self {
                shutdown: shutdown_tx,
                handle,
            },
            BatchReceiver { rx: batch_rx },
        )
    }

    /// Signal the task and wait for it. In-flight reads are abandoned and no
    /// further batch is published.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            log::warn!("Sampling worker ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl BatchReceiver {
    /// Newest unseen batch, without waiting.
    pub fn take_latest(&mut self) -> Option<Arc<SampleBatch>> {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            _ => None,
        }
    }

    /// Wait for the next batch. `None` once the worker has stopped.
    pub async fn next(&mut self) -> Option<Arc<SampleBatch>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}
