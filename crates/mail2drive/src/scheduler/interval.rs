//! Fixed-interval batch loop for deployments without an external scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::batch::BatchTrigger;
use crate::ledger::Trigger;

pub struct PeriodicScheduler {
    batch: Arc<BatchTrigger>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl PeriodicScheduler {
    pub fn new(batch: Arc<BatchTrigger>, interval: Duration) -> Self {
        Self {
            batch,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the loop on the current runtime. A message on `trigger_rx`
    /// runs a batch immediately.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let batch = Arc::clone(&self.batch);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // skip immediate first tick

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = interval_timer.tick() => {},
                    Ok(()) = trigger_rx.recv() => {
                        log::info!("Manual batch run triggered");
                    },
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                match batch.run_enabled(Trigger::Scheduled).await {
                    Ok(report) if report.saved > 0 => {
                        log::info!("Scheduled batch saved {} document(s)", report.saved);
                    }
                    Err(e) => log::error!("Scheduled batch failed: {}", e),
                    _ => {}
                }
            }
        })
    }

    /// Signals the loop to stop after the current batch.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
