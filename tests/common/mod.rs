//! Common test utilities
//!
//! Each integration-test binary uses its own subset of these helpers.
#![allow(dead_code)]

use siphon::config::EngineConfig;
use siphon::models::{PollingConfig, Source, SourceStatus, SourceType};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Create a feed source pointed at a test server
pub fn feed_source(id: &str, url: &str, interval_minutes: u32) -> Source {
    Source {
        id: id.to_string(),
        name: format!("Test source {id}"),
        url: url.to_string(),
        source_type: SourceType::Feed,
        status: SourceStatus::Active,
        polling: PollingConfig {
            interval_minutes,
            // zero backoff keeps manually-driven polls flowing in tests
            retry_backoff_minutes: 0,
            max_retries: 3,
            requests_per_minute: 60,
            timeout_seconds: 5,
            ..Default::default()
        },
        extraction: siphon::models::ExtractionConfig {
            min_content_length: 10,
            max_content_length: 2000,
            expected_language: None,
        },
        auth: Default::default(),
        trust_score: 0.9,
        last_poll_at: None,
        next_poll_at: None,
    }
}

/// Engine config with fast monitor loops for tests
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scheduler.max_concurrent_sources = 4;
    config.scheduler.health_check_interval_secs = 1;
    config.scheduler.retry_failed_interval_secs = 1;
    config
}

/// RSS document with well-formed items
pub fn rss_body(items: &[(&str, &str, &str)]) -> String {
    let items_xml: String = items
        .iter()
        .map(|(title, link, description)| {
            format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description>{description}</description>\
                 <pubDate>Tue, 06 Aug 2024 14:30:00 +0000</pubDate></item>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <rss version=\"2.0\"><channel><title>Test</title>\
         <language>en</language>{items_xml}</channel></rss>"
    )
}

/// Mount a feed endpoint answering `GET /feed.xml` with the given body
pub async fn mount_feed(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml; charset=utf-8")
                .set_body_string(body.to_string()),
        )
        .mount(server)
        .await;
}

/// Mount a feed endpoint that always fails with the given HTTP status
pub async fn mount_failing_feed(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
