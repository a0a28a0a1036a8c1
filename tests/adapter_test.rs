//! Adapter lifecycle tests against a mock HTTP server

mod common;

use std::sync::Arc;
use std::time::Duration;

use siphon::adapter::{build_adapter, AdapterHarness, RateWindow};
use siphon::events::EventBus;
use siphon::models::{AuthScheme, SourceStatus};
use tokio::sync::RwLock;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn harness_for(source: &siphon::models::Source, bus: EventBus) -> AdapterHarness {
    let adapter = build_adapter(source, "siphon-test/0").expect("adapter builds");
    let shared = Arc::new(RwLock::new(source.clone()));
    AdapterHarness::new(source, shared, adapter, bus)
}

// ============================================================================
// Fetch and normalize
// ============================================================================

#[tokio::test]
async fn test_poll_fetches_and_normalizes_feed() {
    let server = MockServer::start().await;
    let body = common::rss_body(&[
        (
            "Acme launches platform",
            "https://example.com/a",
            "A story about the launch with enough words to pass the length check",
        ),
        (
            "Second story",
            "https://example.com/b",
            "More content that is comfortably past the minimum length",
        ),
    ]);
    common::mount_feed(&server, &body).await;

    let source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    let harness = harness_for(&source, EventBus::new(16));

    let outcome = harness.execute_poll().await;
    assert!(outcome.is_success());
    assert_eq!(outcome.total_items, 2);
    assert_eq!(outcome.valid_items, 2);
    assert_eq!(outcome.items[0].source_id, "s1");
    assert_eq!(outcome.items[0].poll_id, outcome.poll_id);
    assert_eq!(outcome.items[0].language.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_poll_drops_defective_items_without_failing() {
    let server = MockServer::start().await;
    // five items: one missing its link, one with undersized content
    let body = common::rss_body(&[
        ("One", "https://example.com/1", "long enough content for validation"),
        ("Two", "", "long enough content for validation here too"),
        ("Three", "https://example.com/3", "tiny"),
        ("Four", "https://example.com/4", "long enough content for validation"),
        ("Five", "https://example.com/5", "long enough content for validation"),
    ]);
    common::mount_feed(&server, &body).await;

    let source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    let harness = harness_for(&source, EventBus::new(16));

    let outcome = harness.execute_poll().await;
    assert!(outcome.is_success());
    assert_eq!(outcome.total_items, 5);
    assert_eq!(outcome.valid_items, 3);
    assert!(outcome.valid_items <= outcome.total_items);

    // every survivor carries the same poll id and the source id
    for item in &outcome.items {
        assert_eq!(item.source_id, "s1");
        assert_eq!(item.poll_id, outcome.poll_id);
    }
}

#[tokio::test]
async fn test_poll_classifies_http_status() {
    let server = MockServer::start().await;
    common::mount_failing_feed(&server, 503).await;

    let source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    let harness = harness_for(&source, EventBus::new(16));

    let outcome = harness.execute_poll().await;
    let failure = outcome.failure.expect("poll must fail");
    assert_eq!(failure.error_type, "http_status");
    assert_eq!(failure.http_status, Some(503));
    assert_eq!(harness.consecutive_errors(), 1);
}

#[tokio::test]
async fn test_poll_classifies_invalid_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>definitely not a feed</body></html>"),
        )
        .mount(&server)
        .await;

    let source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    let harness = harness_for(&source, EventBus::new(16));

    let outcome = harness.execute_poll().await;
    assert_eq!(
        outcome.failure.expect("poll must fail").error_type,
        "invalid_payload"
    );
}

#[tokio::test]
async fn test_fetch_timeout_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    source.polling.timeout_seconds = 1;
    let harness = harness_for(&source, EventBus::new(16));

    let outcome = harness.execute_poll().await;
    assert_eq!(outcome.failure.expect("poll must fail").error_type, "timeout");
}

// ============================================================================
// Auth headers
// ============================================================================

#[tokio::test]
async fn test_bearer_auth_header_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("authorization", "Bearer sekrit-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(common::rss_body(&[(
                    "One",
                    "https://example.com/1",
                    "long enough content for validation",
                )])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    source.auth.scheme = AuthScheme::Bearer {
        token: "sekrit-token".to_string(),
    };
    let harness = harness_for(&source, EventBus::new(16));

    let outcome = harness.execute_poll().await;
    assert!(outcome.is_success());
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_excess_request_delayed_to_window_boundary_not_dropped() {
    let limit = 4u32;
    let gate = RateWindow::per_minute(limit);

    let start = tokio::time::Instant::now();
    for _ in 0..limit {
        gate.acquire().await;
    }
    // the first `limit` requests pass without any delay
    assert_eq!(start.elapsed(), Duration::ZERO);

    // the (limit+1)-th is suspended until the window boundary, then admitted
    gate.acquire().await;
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}

// ============================================================================
// Gates
// ============================================================================

#[tokio::test]
async fn test_backoff_window_gates_after_failure() {
    let server = MockServer::start().await;
    common::mount_failing_feed(&server, 500).await;

    let mut source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    source.polling.retry_backoff_minutes = 30;
    let harness = harness_for(&source, EventBus::new(16));

    assert!(harness.should_poll(chrono::Local::now()).await);
    harness.execute_poll().await;
    assert_eq!(harness.consecutive_errors(), 1);
    // fresh failure puts the adapter inside its backoff window
    assert!(!harness.should_poll(chrono::Local::now()).await);

    harness.reset_error_state();
    assert!(harness.should_poll(chrono::Local::now()).await);
    assert_eq!(harness.consecutive_errors(), 0);
}

#[tokio::test]
async fn test_source_status_not_checked_by_harness() {
    // status gating belongs to the scheduler; the harness polls regardless
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

    let mut source = common::feed_source("s1", &format!("{}/feed.xml", server.uri()), 15);
    source.status = SourceStatus::Inactive;
    let harness = harness_for(&source, EventBus::new(16));
    assert!(harness.execute_poll().await.is_success());
}
