//! # Structured Logging Module
//!
//! Environment-aware structured logging for the pipeline. The library only emits
//! `tracing` events; installing a subscriber is left to the binary (or to tests that
//! want output) through [`init_structured_logging`].

use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::metrics::MetricsSnapshot;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` takes precedence; otherwise the level follows `PIPELINE_ENV`.
/// Set `PIPELINE_LOG_FORMAT=json` for one JSON object per line.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if json_output() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber may already be installed by a test harness
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
            return;
        }

        tracing::info!(environment = %environment, "Structured logging initialized");
    });
}

fn get_environment() -> String {
    std::env::var("PIPELINE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn json_output() -> bool {
    std::env::var("PIPELINE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log an aggregate metrics snapshot
pub fn log_stats(snapshot: &MetricsSnapshot) {
    tracing::info!(
        total_messages = snapshot.total_messages,
        active_producers = snapshot.active_producers,
        active_consumers = snapshot.active_consumers,
        errors = snapshot.error_count,
        processed_messages = snapshot.processed_count,
        in_flight = snapshot.in_flight(),
        queue_depth = snapshot.queue_depth,
        avg_latency_ms = snapshot.average_latency.as_millis() as u64,
        min_latency_ms = snapshot.min_latency.map(|d| d.as_millis() as u64),
        max_latency_ms = snapshot.max_latency.map(|d| d.as_millis() as u64),
        "📊 PIPELINE_STATS"
    );
}

/// Log the processing time of every completed message
pub fn log_message_timings(timings: impl IntoIterator<Item = (String, Duration)>) {
    tracing::info!("Final message processing times:");
    for (message_id, duration) in timings {
        tracing::info!(
            message_id = %message_id,
            duration_ms = duration.as_millis() as u64,
            "Message processing time"
        );
    }
}
