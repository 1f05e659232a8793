//! # Pipeline Orchestrator
//!
//! Owns the bounded queue, the run's cancellation token and the task group. It spawns
//! every producer, consumer and the completion monitor, waits for all of them to settle
//! and reports the first fault.
//!
//! ## Outcome rules
//!
//! - The first non-cancellation error from any task cancels every peer (fail-fast) and
//!   becomes the run's error. Later errors are logged and counted, not reported.
//! - If no task faulted but at least one stopped on cancellation, the run returns
//!   [`PipelineError::Cancelled`].
//! - Final stats and per-message timings are logged after all tasks settle, whatever
//!   the outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::logging::{log_message_timings, log_stats};
use crate::metrics::MetricsStore;
use crate::monitor::CompletionMonitor;
use crate::queue::{MessageQueue, QueueReceiver};
use crate::worker::{Consumer, MessageHandler, NoopHandler, Producer};

/// Totals reported by a run that finished without fault or cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total_messages: u64,
    pub processed_messages: u64,
    pub errors: u64,
    pub average_latency: Duration,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Orchestrator {
    config: PipelineConfig,
    metrics: Arc<MetricsStore>,
    handler: Arc<dyn MessageHandler>,
}

impl Orchestrator {
    /// Validate the configuration and prepare a run with the no-op message handler
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: Arc::new(MetricsStore::new()),
            handler: Arc::new(NoopHandler),
        })
    }

    /// Replace the handler every consumer applies to its messages
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Metrics store the run writes to; clone before `run` to inspect it afterwards
    pub fn metrics(&self) -> Arc<MetricsStore> {
        Arc::clone(&self.metrics)
    }

    /// Run the pipeline to completion.
    ///
    /// `shutdown` is the external stop signal. The run works on a child token, so an
    /// internal fault cancels the run's tasks without cancelling the caller's token.
    #[instrument(skip_all, fields(
        producers = self.config.producer_count,
        consumers = self.config.consumer_count,
        messages_per_producer = self.config.messages_per_producer,
    ))]
    pub async fn run(self, shutdown: CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let cancel = shutdown.child_token();
        let (sender, receiver) = MessageQueue::bounded(self.config.queue_capacity);

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        let mut task_names: HashMap<Id, String> = HashMap::new();

        for id in 1..=self.config.producer_count {
            let producer = Producer::new(
                id,
                &self.config,
                sender.clone(),
                Arc::clone(&self.metrics),
                cancel.clone(),
            );
            let name = producer.name();
            let handle = tasks.spawn(async move { producer.run().await.map(|_| ()) });
            task_names.insert(handle.id(), name);
        }
        // Producers hold the only senders now; the last one to finish closes the queue
        drop(sender);

        for id in 1..=self.config.consumer_count {
            let consumer = Consumer::new(
                id,
                &self.config,
                receiver.clone(),
                Arc::clone(&self.handler),
                Arc::clone(&self.metrics),
                cancel.clone(),
            );
            let name = consumer.name();
            let handle = tasks.spawn(async move { consumer.run().await.map(|_| ()) });
            task_names.insert(handle.id(), name);
        }

        let monitor = CompletionMonitor::new(
            self.config.monitor_interval(),
            receiver.clone(),
            Arc::clone(&self.metrics),
            cancel.clone(),
        );
        let handle = tasks.spawn(async move { monitor.run().await.map(|_| ()) });
        task_names.insert(handle.id(), "monitor".to_string());

        info!(tasks = tasks.len(), "Pipeline started");

        let mut first_fault: Option<PipelineError> = None;
        let mut saw_cancellation = false;

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(join_error) => {
                    self.metrics.increment_errors();
                    Err(task_failure(&task_names, join_error))
                }
            };

            match outcome {
                Ok(()) => {}
                Err(error) if error.is_cancellation() => saw_cancellation = true,
                Err(error) => {
                    if first_fault.is_none() {
                        error!(error = %error, "Task failed, cancelling pipeline");
                        cancel.cancel();
                        first_fault = Some(error);
                    } else {
                        warn!(error = %error, "Additional task failure after cancellation");
                    }
                }
            }
        }

        self.report_final(&receiver);

        if let Some(fault) = first_fault {
            error!(error = %fault, "Application error");
            return Err(fault);
        }
        if saw_cancellation {
            info!("Pipeline stopped by cancellation");
            return Err(PipelineError::Cancelled);
        }

        let snapshot = self.metrics.snapshot_stats();
        let summary = RunSummary {
            total_messages: snapshot.total_messages,
            processed_messages: snapshot.processed_count,
            errors: snapshot.error_count,
            average_latency: snapshot.average_latency,
            elapsed: started.elapsed(),
        };
        info!(
            total_messages = summary.total_messages,
            processed_messages = summary.processed_messages,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "All producers and consumers have completed"
        );
        Ok(summary)
    }

    fn report_final(&self, receiver: &QueueReceiver) {
        log_stats(
            &self
                .metrics
                .snapshot_stats()
                .with_queue_depth(receiver.len()),
        );
        log_message_timings(self.metrics.all_completed_timings());
    }
}

fn task_failure(task_names: &HashMap<Id, String>, join_error: JoinError) -> PipelineError {
    let task = task_names
        .get(&join_error.id())
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    let reason = if join_error.is_panic() {
        "panicked".to_string()
    } else {
        join_error.to_string()
    };
    PipelineError::TaskPanicked { task, reason }
}
