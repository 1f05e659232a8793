//! End-to-end runs of the pipeline that complete without cancellation.

mod common;

use common::{fast_config, RUN_TIMEOUT};
use producer_consumer::{DelayRange, Orchestrator};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_two_by_two_processes_exactly_ten_messages() {
    let orchestrator = Orchestrator::new(fast_config(2, 2, 5)).unwrap();
    let metrics = orchestrator.metrics();

    let summary = tokio::time::timeout(RUN_TIMEOUT, orchestrator.run(CancellationToken::new()))
        .await
        .expect("run should not hang")
        .expect("run should succeed");

    assert_eq!(summary.total_messages, 10);
    assert_eq!(summary.processed_messages, 10);
    assert_eq!(summary.errors, 0);
    assert_eq!(metrics.active_producers(), 0);
    assert_eq!(metrics.active_consumers(), 0);

    let timings: Vec<_> = metrics.all_completed_timings().collect();
    let unique: HashSet<_> = timings.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(timings.len(), 10);
    assert_eq!(unique.len(), 10, "no message may be processed twice");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_total_is_producers_times_messages() {
    let config = fast_config(6, 3, 7);
    let expected = config.expected_messages() as u64;
    let orchestrator = Orchestrator::new(config).unwrap();
    let metrics = orchestrator.metrics();

    let summary = tokio::time::timeout(RUN_TIMEOUT, orchestrator.run(CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.total_messages, expected);
    assert_eq!(summary.processed_messages, expected);
    assert_eq!(metrics.record_count() as u64, expected);
}

#[tokio::test]
async fn test_average_latency_matches_completed_timings() {
    let orchestrator = Orchestrator::new(fast_config(3, 2, 4)).unwrap();
    let metrics = orchestrator.metrics();

    let summary = tokio::time::timeout(RUN_TIMEOUT, orchestrator.run(CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();

    let latencies: Vec<_> = metrics.all_completed_timings().map(|(_, d)| d).collect();
    let total_nanos: u128 = latencies.iter().map(|d| d.as_nanos()).sum();
    let mean = total_nanos / latencies.len() as u128;
    assert_eq!(summary.average_latency.as_nanos(), mean);
}

#[tokio::test]
async fn test_capacity_one_applies_backpressure_without_loss() {
    let mut config = fast_config(3, 1, 4);
    config.queue_capacity = 1;
    config.producer_delay = DelayRange::fixed(0);
    config.consumer_delay = DelayRange::fixed(3);
    let orchestrator = Orchestrator::new(config).unwrap();

    let summary = tokio::time::timeout(RUN_TIMEOUT, orchestrator.run(CancellationToken::new()))
        .await
        .unwrap()
        .expect("a full queue is backpressure, not an error");

    assert_eq!(summary.total_messages, 12);
    assert_eq!(summary.processed_messages, 12);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn test_no_producers_finishes_immediately() {
    let orchestrator = Orchestrator::new(fast_config(0, 2, 5)).unwrap();

    let summary = tokio::time::timeout(RUN_TIMEOUT, orchestrator.run(CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.total_messages, 0);
    assert_eq!(summary.processed_messages, 0);
}

#[tokio::test]
async fn test_completed_latency_covers_processing_delay() {
    let mut config = fast_config(2, 2, 5);
    config.consumer_delay = DelayRange::fixed(10);
    let orchestrator = Orchestrator::new(config).unwrap();
    let metrics = orchestrator.metrics();

    tokio::time::timeout(RUN_TIMEOUT, orchestrator.run(CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();

    let timings: Vec<_> = metrics.all_completed_timings().collect();
    assert_eq!(timings.len(), 10);
    for (message_id, latency) in timings {
        assert!(
            latency >= Duration::from_millis(10),
            "message {message_id} finished in {latency:?}, before its processing delay"
        );
    }
}

