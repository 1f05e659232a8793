//! # Consumer Task
//!
//! Pulls messages until the token is cancelled or the queue is closed and drained.
//! Each message is "processed" by sleeping a random delay and then passing it to a
//! [`MessageHandler`]; both steps race the cancellation token. On success the
//! message's end time is recorded.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::message::Message;
use crate::metrics::{ActivityGuard, MetricsStore};
use crate::queue::QueueReceiver;

use super::delay::DelaySampler;

/// Work applied to each message after the simulated processing delay.
///
/// Returning an error fails the consumer and, through the orchestrator, the whole run.
#[async_trait]
pub trait MessageHandler: Send + Sync + Debug {
    async fn handle(&self, consumer_id: usize, message: &Message) -> Result<()>;
}

/// Handler that accepts every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

#[async_trait]
impl MessageHandler for NoopHandler {
    async fn handle(&self, _consumer_id: usize, _message: &Message) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct Consumer {
    id: usize,
    delay: DelaySampler,
    queue: QueueReceiver,
    handler: Arc<dyn MessageHandler>,
    metrics: Arc<MetricsStore>,
    cancel: CancellationToken,
    _activity: ActivityGuard,
}

impl Consumer {
    /// Create a consumer and count it as active immediately
    pub fn new(
        id: usize,
        config: &PipelineConfig,
        queue: QueueReceiver,
        handler: Arc<dyn MessageHandler>,
        metrics: Arc<MetricsStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_sampler(
            id,
            DelaySampler::new(config.consumer_delay),
            queue,
            handler,
            metrics,
            cancel,
        )
    }

    pub fn with_sampler(
        id: usize,
        delay: DelaySampler,
        queue: QueueReceiver,
        handler: Arc<dyn MessageHandler>,
        metrics: Arc<MetricsStore>,
        cancel: CancellationToken,
    ) -> Self {
        let activity = metrics.track_consumer();
        Self {
            id,
            delay,
            queue,
            handler,
            metrics,
            cancel,
            _activity: activity,
        }
    }

    pub fn name(&self) -> String {
        format!("consumer-{}", self.id)
    }

    /// Consume until the queue is closed and empty, returning how many messages
    /// this consumer processed.
    pub async fn run(mut self) -> Result<usize> {
        let mut processed = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(consumer_id = self.id, messages_processed = processed, "Consumer cancelled");
                    return Err(PipelineError::Cancelled);
                }
                next = self.queue.recv() => next,
            };

            let Some(message) = next else {
                info!(consumer_id = self.id, messages_processed = processed, "Consumer completed");
                return Ok(processed);
            };

            if let Err(error) = self.process(&message).await {
                if !error.is_cancellation() {
                    self.metrics.increment_errors();
                    warn!(
                        consumer_id = self.id,
                        message_id = %message.id,
                        error = %error,
                        "Message processing failed"
                    );
                }
                return Err(error);
            }
            processed += 1;
        }
    }

    async fn process(&mut self, message: &Message) -> Result<()> {
        let delay = self.delay.next_delay();
        let (handler, consumer_id) = (&self.handler, self.id);
        let work = async move {
            tokio::time::sleep(delay).await;
            handler.handle(consumer_id, message).await
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = work => result?,
        }

        self.metrics.record_end(message);
        info!(
            consumer_id = self.id,
            message_id = %message.id,
            "Message processed"
        );
        Ok(())
    }
}
