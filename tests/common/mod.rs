//! Shared helpers for pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use producer_consumer::{DelayRange, Message, MessageHandler, PipelineConfig, PipelineError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, Mutex};
use std::time::Duration;

/// Upper bound for any single pipeline run in these tests
pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration with millisecond delays and a fast monitor tick
pub fn fast_config(producers: usize, consumers: usize, messages: usize) -> PipelineConfig {
    PipelineConfig {
        producer_count: producers,
        consumer_count: consumers,
        messages_per_producer: messages,
        queue_capacity: 100,
        producer_delay: DelayRange::new(1, 5),
        consumer_delay: DelayRange::new(1, 5),
        monitor_interval_ms: 20,
    }
}

/// Fails the n-th message it sees (1-based), accepting all others
#[derive(Debug)]
pub struct FailOnNth {
    target: usize,
    seen: AtomicUsize,
}

impl FailOnNth {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            seen: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MessageHandler for FailOnNth {
    async fn handle(&self, consumer_id: usize, message: &Message) -> producer_consumer::Result<()> {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen == self.target {
            return Err(PipelineError::processing(
                format!("consumer-{consumer_id}"),
                message.id.clone(),
                "simulated processing failure",
            ));
        }
        Ok(())
    }
}

/// Panics on the first message
#[derive(Debug)]
pub struct PanickingHandler;

#[async_trait]
impl MessageHandler for PanickingHandler {
    async fn handle(&self, _consumer_id: usize, _message: &Message) -> producer_consumer::Result<()> {
        panic!("handler exploded");
    }
}

/// Holds `parties` consumers at a barrier and then fails all of them in the same instant.
///
/// The barrier is waited on synchronously inside `block_in_place`, so no consumer can
/// observe the cancellation triggered by a peer's fault before failing itself.
/// Requires the multi-thread runtime.
#[derive(Debug)]
pub struct FailTogether {
    barrier: Barrier,
    failed: Mutex<Vec<String>>,
}

impl FailTogether {
    pub fn new(parties: usize) -> Self {
        Self {
            barrier: Barrier::new(parties),
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for FailTogether {
    async fn handle(&self, consumer_id: usize, message: &Message) -> producer_consumer::Result<()> {
        tokio::task::block_in_place(|| self.barrier.wait());
        self.failed.lock().unwrap().push(message.id.clone());
        Err(PipelineError::processing(
            format!("consumer-{consumer_id}"),
            message.id.clone(),
            "failed alongside a peer",
        ))
    }
}

