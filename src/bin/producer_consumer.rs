//! # Producer/Consumer Binary
//!
//! Runs the pipeline with configuration from defaults, `pipeline.toml`, `PIPELINE_*`
//! environment variables and command-line flags (highest precedence). SIGINT/SIGTERM
//! cancel the run gracefully.
//!
//! Exit code is 0 on completion or signal shutdown and 1 when any task faulted.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use producer_consumer::logging::init_structured_logging;
use producer_consumer::{Orchestrator, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "producer-consumer")]
#[command(about = "A producer-consumer application")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Number of producers [default: 10]
    #[arg(short, long, value_name = "NUM_PRODUCERS")]
    producers: Option<usize>,

    /// Number of consumers [default: 5]
    #[arg(short, long, value_name = "NUM_CONSUMERS")]
    consumers: Option<usize>,

    /// Number of messages per producer [default: 5]
    #[arg(short, long, value_name = "NUM_MESSAGES_PER_PRODUCER")]
    messages: Option<usize>,

    /// Bounded queue capacity [default: 100]
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Configuration file (TOML); `pipeline.toml` is used when present
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())
            .context("Failed to load pipeline configuration")?;

        if let Some(producers) = self.producers {
            config.producer_count = producers;
        }
        if let Some(consumers) = self.consumers {
            config.consumer_count = consumers;
        }
        if let Some(messages) = self.messages {
            config.messages_per_producer = messages;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }

        config.validate().context("Invalid command-line overrides")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_structured_logging();
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Configuration error");
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "Failed to create orchestrator");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting with {} producers and {} consumers",
        orchestrator.config().producer_count,
        orchestrator.config().consumer_count
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    match orchestrator.run(shutdown).await {
        Ok(summary) => {
            info!(
                consumed = summary.processed_messages,
                "Number of messages consumed: {}", summary.processed_messages
            );
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancellation() => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}

async fn shutdown_on_signal(shutdown: CancellationToken) {
    use tokio::signal;

    #[cfg(unix)]
    {
        use signal::unix::{signal as unix_signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            unix_signal(SignalKind::terminate()),
            unix_signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        }
        shutdown.cancel();
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating graceful shutdown");
        shutdown.cancel();
    }
}
