//! Item validation and normalization properties

mod common;

use proptest::prelude::*;
use siphon::extract::{
    extract_keywords, infer_category, normalize_item, truncate_content, MAX_KEYWORDS,
    TRUNCATION_MARKER,
};
use siphon::models::{Category, RawItem, TrustLevel};

fn raw(title: Option<&str>, url: Option<&str>, content: &str) -> RawItem {
    RawItem {
        title: title.map(String::from),
        url: url.map(String::from),
        summary: Some("summary of the item".to_string()),
        content: Some(content.to_string()),
        published_at: Some("2024-08-06T10:00:00Z".to_string()),
        author: None,
        language: None,
    }
}

#[test]
fn test_items_missing_title_or_url_never_survive() {
    let source = common::feed_source("s1", "https://example.com/feed.xml", 15);
    let content = "plenty of content for the minimum length check";

    assert!(normalize_item(raw(None, Some("https://x.com/a"), content), &source, "p").is_none());
    assert!(normalize_item(raw(Some("Title"), None, content), &source, "p").is_none());
    assert!(normalize_item(raw(None, None, content), &source, "p").is_none());
    assert!(normalize_item(raw(Some("Title"), Some("https://x.com/a"), content), &source, "p").is_some());
}

#[test]
fn test_truncation_exact_length_and_single_marker() {
    let source = common::feed_source("s1", "https://example.com/feed.xml", 15);
    let max = source.extraction.max_content_length;
    let long_content = "lorem ipsum dolor sit amet ".repeat(200);

    let item = normalize_item(
        raw(Some("Title"), Some("https://x.com/a"), &long_content),
        &source,
        "p",
    )
    .unwrap();

    assert_eq!(
        item.content.chars().count(),
        max + TRUNCATION_MARKER.chars().count()
    );
    assert_eq!(item.content.matches(TRUNCATION_MARKER).count(), 1);
}

#[test]
fn test_category_inference_first_match_wins() {
    // "launches" (product_launch) appears in text that also mentions
    // "funding"; the earlier taxonomy entry must win, deterministically
    let text = "Company launches product after funding round";
    assert_eq!(infer_category(text), Category::ProductLaunch);
    for _ in 0..5 {
        assert_eq!(infer_category(text), Category::ProductLaunch);
    }
}

#[test]
fn test_category_default() {
    assert_eq!(
        infer_category("a quiet day with nothing notable"),
        Category::CompetitiveAnalysis
    );
}

#[test]
fn test_trust_level_derivation() {
    let mut source = common::feed_source("s1", "https://example.com/feed.xml", 15);
    let content = "plenty of content for the minimum length check";

    source.trust_score = 0.71;
    let item = normalize_item(raw(Some("T"), Some("https://x.com/a"), content), &source, "p").unwrap();
    assert_eq!(item.trust_level, TrustLevel::Reliable);

    source.trust_score = 0.7;
    let item = normalize_item(raw(Some("T"), Some("https://x.com/a"), content), &source, "p").unwrap();
    assert_eq!(item.trust_level, TrustLevel::Unverified);
}

proptest! {
    #[test]
    fn prop_truncate_never_exceeds_limit_plus_marker(content in ".{0,4000}", max in 10usize..500) {
        let out = truncate_content(&content, max);
        prop_assert!(out.chars().count() <= max + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn prop_keywords_capped_and_deduplicated(text in "[a-zA-Z ,.]{0,2000}") {
        let keywords = extract_keywords(&text);
        prop_assert!(keywords.len() <= MAX_KEYWORDS);
        let unique: std::collections::HashSet<_> = keywords.iter().collect();
        prop_assert_eq!(unique.len(), keywords.len());
        for kw in &keywords {
            prop_assert!(kw.len() > 3);
            prop_assert_eq!(kw.to_lowercase(), kw.clone());
        }
    }

    #[test]
    fn prop_category_total(text in ".{0,500}") {
        // inference never panics and always lands on some category
        let _ = infer_category(&text);
    }
}
