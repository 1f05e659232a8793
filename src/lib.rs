#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)]

//! # Producer/Consumer Pipeline
//!
//! A bounded-queue pipeline in which producer tasks generate timestamped messages at
//! randomized intervals, consumer tasks drain and process them, a shared metrics store
//! tracks throughput and latency, and a completion monitor reports progress.
//!
//! ## Coordination
//!
//! All tasks share one [`tokio_util::sync::CancellationToken`]. The first task to fail
//! cancels the token and every peer stops at its next suspension point. The queue is
//! closed by the last producer to finish, so consumers terminate exactly when the
//! producers are done and the queue has been drained.
//!
//! ## Module Organization
//!
//! - [`config`] - Run configuration and layered loading
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing subscriber setup and structured event helpers
//! - [`message`] - Message and latency record value types
//! - [`metrics`] - Concurrent metrics store
//! - [`queue`] - Bounded multi-consumer message queue
//! - [`worker`] - Producer and consumer tasks
//! - [`monitor`] - Periodic stats and completion detection
//! - [`orchestrator`] - Spawns the task group and aggregates the outcome
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use producer_consumer::{Orchestrator, PipelineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> producer_consumer::Result<()> {
//! let config = PipelineConfig {
//!     producer_count: 2,
//!     consumer_count: 2,
//!     ..PipelineConfig::default()
//! };
//!
//! let summary = Orchestrator::new(config)?.run(CancellationToken::new()).await?;
//! println!("processed {} of {}", summary.processed_messages, summary.total_messages);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod queue;
pub mod worker;

pub use config::{DelayRange, PipelineConfig};
pub use error::{PipelineError, Result};
pub use message::{LatencyRecord, Message};
pub use metrics::{ActivityGuard, MetricsSnapshot, MetricsStore};
pub use monitor::CompletionMonitor;
pub use orchestrator::{Orchestrator, RunSummary};
pub use queue::{MessageQueue, QueueReceiver, QueueSender};
pub use worker::{Consumer, MessageHandler, NoopHandler, Producer};
