//! Integration tests for the fleet scheduler
//!
//! These tests verify the complete workflow of:
//! - Registration, polling and stats accounting
//! - Demotion to error status after the retry budget is exhausted
//! - Resurrection through the retry loop
//! - Item republication on the notification channel

mod common;

use siphon::events::SignalEvent;
use siphon::models::SourceStatus;
use siphon::scheduler::{SignalScheduler, SourceUpdate};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Polling and stats
// ============================================================================

#[tokio::test]
async fn test_manual_poll_updates_stats_and_republishes_items() {
    let server = MockServer::start().await;
    common::mount_feed(
        &server,
        &common::rss_body(&[
            ("One", "https://example.com/1", "long enough content for validation"),
            ("Two", "https://example.com/2", "long enough content for validation"),
        ]),
    )
    .await;

    let scheduler = SignalScheduler::new(common::test_config());
    let mut events = scheduler.subscribe();
    scheduler
        .add_source(common::feed_source(
            "s1",
            &format!("{}/feed.xml", server.uri()),
            5,
        ))
        .await
        .unwrap();

    scheduler.poll_source("s1").await.unwrap();

    let stats = scheduler.get_stats().await;
    assert_eq!(stats.total_polls, 1);
    assert_eq!(stats.successful_polls, 1);
    assert_eq!(stats.failed_polls, 0);
    assert_eq!(stats.items_ingested, 2);
    assert_eq!(stats.success_rate, 1.0);
    assert_eq!(stats.avg_items_per_poll, 2.0);

    // poll_success, metrics_update, then the republished batch
    let mut saw_items = false;
    while let Ok(event) = events.try_recv() {
        if let SignalEvent::ItemsIngested {
            source_id,
            items,
            metadata,
        } = event
        {
            assert_eq!(source_id, "s1");
            assert_eq!(items.len(), 2);
            assert_eq!(metadata.poll_id, items[0].poll_id);
            saw_items = true;
        }
    }
    assert!(saw_items, "items_ingested must be republished");

    let reports = scheduler.get_source_statuses().await;
    assert_eq!(reports.len(), 1);
    assert!(reports[0].last_poll.is_some());
    assert!(reports[0].next_poll.is_some());
}

#[tokio::test]
async fn test_polling_inactive_source_is_a_noop() {
    let server = MockServer::start().await;
    common::mount_feed(&server, &common::rss_body(&[])).await;

    let scheduler = SignalScheduler::new(common::test_config());
    scheduler
        .add_source(common::feed_source(
            "s1",
            &format!("{}/feed.xml", server.uri()),
            5,
        ))
        .await
        .unwrap();
    scheduler
        .update_source(
            "s1",
            SourceUpdate {
                status: Some(SourceStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    scheduler.poll_source("s1").await.unwrap();
    assert_eq!(scheduler.get_stats().await.total_polls, 0);
}

// ============================================================================
// Failure escalation and recovery
// ============================================================================

#[tokio::test]
async fn test_three_failures_demote_source_and_retry_loop_resurrects_it() {
    let server = MockServer::start().await;
    common::mount_failing_feed(&server, 500).await;

    let scheduler = SignalScheduler::new(common::test_config());
    let mut events = scheduler.subscribe();

    // interval 5, requests_per_minute well above need, max_retries 3
    let source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 5);
    assert_eq!(source.polling.max_retries, 3);
    scheduler.add_source(source).await.unwrap();

    // two failures: still active, streak building
    scheduler.poll_source("s1").await.unwrap();
    scheduler.poll_source("s1").await.unwrap();
    assert_eq!(scheduler.source_status("s1").await, Some(SourceStatus::Active));

    // consecutive_errors == max_retries - 1; one more failure demotes
    scheduler.poll_source("s1").await.unwrap();
    assert_eq!(scheduler.source_status("s1").await, Some(SourceStatus::Error));

    // further polls are no-ops, not errors
    scheduler.poll_source("s1").await.unwrap();
    let stats = scheduler.get_stats().await;
    assert_eq!(stats.total_polls, 3);
    assert_eq!(stats.failed_polls, 3);
    assert_eq!(stats.failed_sources, 1);
    assert_eq!(stats.active_sources, 0);

    // source_failed fired exactly once
    let mut source_failed = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SignalEvent::SourceFailed { .. }) {
            source_failed += 1;
        }
    }
    assert_eq!(source_failed, 1);

    // the retry loop is the only path back to active
    let retried = scheduler.run_retry_cycle().await;
    assert_eq!(retried, 1);
    assert_eq!(scheduler.source_status("s1").await, Some(SourceStatus::Active));

    let reports = scheduler.get_source_statuses().await;
    assert_eq!(reports[0].consecutive_errors, 0);
    assert_eq!(scheduler.get_stats().await.failed_sources, 0);
}

#[tokio::test]
async fn test_resurrected_source_can_fail_again() {
    let server = MockServer::start().await;
    common::mount_failing_feed(&server, 500).await;

    let scheduler = SignalScheduler::new(common::test_config());
    scheduler
        .add_source(common::feed_source(
            "s1",
            &format!("{}/feed.xml", server.uri()),
            5,
        ))
        .await
        .unwrap();

    for _ in 0..3 {
        scheduler.poll_source("s1").await.unwrap();
    }
    assert_eq!(scheduler.source_status("s1").await, Some(SourceStatus::Error));

    scheduler.run_retry_cycle().await;
    assert_eq!(scheduler.source_status("s1").await, Some(SourceStatus::Active));

    // best-effort: the streak restarts from zero and demotion recurs
    for _ in 0..3 {
        scheduler.poll_source("s1").await.unwrap();
    }
    assert_eq!(scheduler.source_status("s1").await, Some(SourceStatus::Error));
}

#[tokio::test]
async fn test_recovery_after_transient_failures() {
    let server = MockServer::start().await;
    // two failures, then the feed comes back
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    common::mount_feed(
        &server,
        &common::rss_body(&[(
            "Back online",
            "https://example.com/1",
            "long enough content for validation",
        )]),
    )
    .await;

    let scheduler = SignalScheduler::new(common::test_config());
    scheduler
        .add_source(common::feed_source(
            "s1",
            &format!("{}/feed.xml", server.uri()),
            5,
        ))
        .await
        .unwrap();

    scheduler.poll_source("s1").await.unwrap();
    scheduler.poll_source("s1").await.unwrap();
    scheduler.poll_source("s1").await.unwrap();

    // success arrived before the third failure, so the source never demoted
    assert_eq!(scheduler.source_status("s1").await, Some(SourceStatus::Active));
    let stats = scheduler.get_stats().await;
    assert_eq!(stats.failed_polls, 2);
    assert_eq!(stats.successful_polls, 1);
    assert_eq!(stats.items_ingested, 1);
    assert_eq!(
        scheduler.get_source_statuses().await[0].consecutive_errors,
        0
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_removed_source_is_forgotten() {
    let server = MockServer::start().await;
    common::mount_feed(&server, &common::rss_body(&[])).await;

    let scheduler = SignalScheduler::new(common::test_config());
    scheduler
        .add_source(common::feed_source(
            "s1",
            &format!("{}/feed.xml", server.uri()),
            5,
        ))
        .await
        .unwrap();
    scheduler.remove_source("s1").await.unwrap();

    assert!(scheduler.poll_source("s1").await.is_err());
    assert_eq!(scheduler.get_stats().await.total_sources, 0);
}

#[tokio::test]
async fn test_scheduled_job_polls_immediately_on_start() {
    let server = MockServer::start().await;
    common::mount_feed(
        &server,
        &common::rss_body(&[(
            "One",
            "https://example.com/1",
            "long enough content for validation",
        )]),
    )
    .await;

    let scheduler = SignalScheduler::new(common::test_config());
    let mut events = scheduler.subscribe();
    scheduler
        .add_source(common::feed_source(
            "s1",
            &format!("{}/feed.xml", server.uri()),
            5,
        ))
        .await
        .unwrap();

    scheduler.start().await.unwrap();

    // the recurring job fires immediately; wait for its first poll event
    let event = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(SignalEvent::PollSuccess { source_id, .. }) => break source_id,
                Ok(_) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("first poll must fire promptly");
    assert_eq!(event, "s1");

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn test_health_snapshot_reflects_fleet() {
    let server = MockServer::start().await;
    common::mount_failing_feed(&server, 500).await;

    let scheduler = SignalScheduler::new(common::test_config());
    let mut events = scheduler.subscribe();
    scheduler
        .add_source(common::feed_source(
            "bad",
            &format!("{}/feed.xml", server.uri()),
            5,
        ))
        .await
        .unwrap();

    for _ in 0..3 {
        scheduler.poll_source("bad").await.unwrap();
    }

    let snapshot = scheduler.run_health_check().await;
    assert_eq!(snapshot.total_sources, 1);
    assert_eq!(snapshot.unhealthy_sources, 1);
    assert_eq!(snapshot.healthy_sources, 0);
    assert_eq!(snapshot.sources[0].status, SourceStatus::Error);
    assert_eq!(snapshot.sources[0].consecutive_errors, 3);

    // the pass was also published as a health_check event
    let mut saw_health = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SignalEvent::HealthCheck(_)) {
            saw_health = true;
        }
    }
    assert!(saw_health);

    // health monitoring is observational: status untouched
    assert_eq!(scheduler.source_status("bad").await, Some(SourceStatus::Error));
}
