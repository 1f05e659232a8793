//! # Producer Task
//!
//! Generates a fixed number of messages sequentially. For each message the producer
//! checks the cancellation token, creates the message, sleeps a random delay and then
//! waits for queue space while racing the token.
//!
//! The per-message sleep is deliberately not cancellable: once it starts it runs to
//! completion, and cancellation is observed at the following enqueue or loop check.
//! A full queue is backpressure, not an error; the producer simply waits.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::message::Message;
use crate::metrics::{ActivityGuard, MetricsStore};
use crate::queue::QueueSender;

use super::delay::DelaySampler;

#[derive(Debug)]
pub struct Producer {
    id: usize,
    message_count: usize,
    delay: DelaySampler,
    queue: QueueSender,
    metrics: Arc<MetricsStore>,
    cancel: CancellationToken,
    _activity: ActivityGuard,
}

impl Producer {
    /// Create a producer and count it as active immediately
    pub fn new(
        id: usize,
        config: &PipelineConfig,
        queue: QueueSender,
        metrics: Arc<MetricsStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_sampler(
            id,
            config.messages_per_producer,
            DelaySampler::new(config.producer_delay),
            queue,
            metrics,
            cancel,
        )
    }

    pub fn with_sampler(
        id: usize,
        message_count: usize,
        delay: DelaySampler,
        queue: QueueSender,
        metrics: Arc<MetricsStore>,
        cancel: CancellationToken,
    ) -> Self {
        let activity = metrics.track_producer();
        Self {
            id,
            message_count,
            delay,
            queue,
            metrics,
            cancel,
            _activity: activity,
        }
    }

    pub fn name(&self) -> String {
        format!("producer-{}", self.id)
    }

    /// Produce every message, returning how many were enqueued.
    ///
    /// Consumes the producer: its queue handle and activity guard are released when
    /// this future completes or is dropped.
    pub async fn run(mut self) -> Result<usize> {
        let mut sent = 0;

        for sequence in 1..=self.message_count {
            if self.cancel.is_cancelled() {
                debug!(producer_id = self.id, messages_sent = sent, "Producer cancelled");
                return Err(PipelineError::Cancelled);
            }

            let message = Message::new();
            tokio::time::sleep(self.delay.next_delay()).await;

            if let Err(error) = self.send(message, sequence).await {
                if !error.is_cancellation() {
                    self.metrics.increment_errors();
                    warn!(producer_id = self.id, error = %error, "Producer failed");
                }
                return Err(error);
            }
            sent += 1;
        }

        info!(producer_id = self.id, messages_sent = sent, "Producer completed");
        Ok(sent)
    }

    async fn send(&self, message: Message, sequence: usize) -> Result<()> {
        let slot = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
            slot = self.queue.reserve() => slot.ok_or_else(|| PipelineError::QueueClosed {
                worker: self.name(),
            })?,
        };

        // The start record must exist before a consumer can see the message
        self.metrics.record_start(&message);
        self.metrics.increment_total_messages();

        let message_id = message.id.clone();
        slot.send(message);

        info!(
            producer_id = self.id,
            message_id = %message_id,
            message_num = sequence,
            "Message sent"
        );
        Ok(())
    }
}
