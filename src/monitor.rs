//! # Completion Monitor
//!
//! Long-lived task that wakes on a fixed interval, logs aggregate stats and detects when
//! the run has drained: no producer is active and the queue is empty. On drain it logs
//! the final stats and the per-message timing dump, then stops.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::logging::{log_message_timings, log_stats};
use crate::metrics::{MetricsSnapshot, MetricsStore};
use crate::queue::QueueReceiver;

#[derive(Debug)]
pub struct CompletionMonitor {
    interval: Duration,
    queue: QueueReceiver,
    metrics: Arc<MetricsStore>,
    cancel: CancellationToken,
}

impl CompletionMonitor {
    pub fn new(
        interval: Duration,
        queue: QueueReceiver,
        metrics: Arc<MetricsStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            interval,
            queue,
            metrics,
            cancel,
        }
    }

    /// True once every producer has finished and nothing is left in the queue
    pub fn is_drained(&self) -> bool {
        self.metrics.active_producers() == 0 && self.queue.is_empty()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot_stats()
            .with_queue_depth(self.queue.len())
    }

    /// Tick until the run drains (returning the number of ticks taken) or the
    /// token is cancelled.
    pub async fn run(self) -> Result<u64> {
        // First check happens one full interval after start
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(ticks, "Monitor cancelled");
                    return Err(PipelineError::Cancelled);
                }
                _ = ticker.tick() => {
                    ticks += 1;
                    let snapshot = self.snapshot();
                    log_stats(&snapshot);

                    if self.is_drained() {
                        log_message_timings(self.metrics.all_completed_timings());
                        info!(
                            ticks,
                            total_messages = snapshot.total_messages,
                            "Producers finished and queue drained"
                        );
                        return Ok(ticks);
                    }
                }
            }
        }
    }
}
