//! Validation and normalization of raw poll payloads
//!
//! Each raw item is processed independently: a defective item is dropped
//! (logged at debug level) without failing the poll that carried it.
//! Survivors come out as immutable [`SignalItem`]s with inferred category,
//! derived trust level, extracted keywords and full provenance.

pub mod keywords;
pub mod normalize;
pub mod taxonomy;

use chrono::Utc;

use crate::models::{ItemStatus, Priority, RawItem, SignalItem, Source};

pub use keywords::{extract_keywords, MAX_KEYWORDS};
pub use normalize::{
    clean_text, collapse_whitespace, parse_published, strip_html, truncate_content,
    HARD_CONTENT_CAP, TRUNCATION_MARKER,
};
pub use taxonomy::infer_category;

/// Validate and normalize one raw item into a [`SignalItem`]
///
/// Returns `None` when the item must be dropped: missing title or URL, or
/// normalized content shorter than the source's `min_content_length`.
pub fn normalize_item(raw: RawItem, source: &Source, poll_id: &str) -> Option<SignalItem> {
    let title = raw
        .title
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty());
    let url = raw.url.as_deref().map(str::trim).filter(|u| !u.is_empty());

    let (Some(title), Some(url)) = (title, url) else {
        tracing::debug!(
            source = %source.id,
            poll = poll_id,
            "dropping item missing title or url"
        );
        return None;
    };

    let summary = raw.summary.as_deref().map(clean_text).unwrap_or_default();
    let content = raw
        .content
        .as_deref()
        .map(clean_text)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| summary.clone());

    if content.chars().count() < source.extraction.min_content_length {
        tracing::debug!(
            source = %source.id,
            poll = poll_id,
            url,
            len = content.chars().count(),
            "dropping item below min_content_length"
        );
        return None;
    }

    let content = truncate_content(&content, source.extraction.max_content_length);
    let published_at = parse_published(raw.published_at.as_deref());
    let category = infer_category(&format!("{title} {summary}"));
    let keywords = extract_keywords(&format!("{title} {summary}"));
    let language = raw
        .language
        .or_else(|| source.extraction.expected_language.clone());

    Some(SignalItem {
        id: SignalItem::new_id(),
        title,
        summary,
        content,
        url: url.to_string(),
        published_at,
        author: raw.author.map(|a| collapse_whitespace(&a)),
        category,
        priority: Priority::default(),
        trust_level: source.trust_level(),
        status: ItemStatus::Raw,
        keywords,
        language,
        source_id: source.id.clone(),
        poll_id: poll_id.to_string(),
        discovered_at: Utc::now(),
    })
}
