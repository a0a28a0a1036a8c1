//! Text and date normalization for raw feed items
//!
//! Raw items arrive with HTML fragments, entity escapes, ragged whitespace
//! and a zoo of date representations. Everything downstream (length checks,
//! category inference, keyword extraction) runs on the cleaned form
//! produced here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Marker appended exactly once to content cut at `max_content_length`
pub const TRUNCATION_MARKER: &str = "… [truncated]";

/// Defensive ceiling applied regardless of per-source configuration
pub const HARD_CONTENT_CAP: usize = 20_000;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Strip HTML tags and decode entities, leaving plain text
///
/// Feed descriptions routinely embed markup; the parsed fragment's text
/// nodes are what we keep.
pub fn strip_html(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return input.to_string();
    }
    let fragment = scraper::Html::parse_fragment(input);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    html_escape::decode_html_entities(&text).to_string()
}

/// Collapse runs of whitespace and line breaks into single spaces and trim
pub fn collapse_whitespace(input: &str) -> String {
    whitespace_re().replace_all(input, " ").trim().to_string()
}

/// Full cleanup pass: strip markup, collapse whitespace, hard-cap length
pub fn clean_text(input: &str) -> String {
    let text = collapse_whitespace(&strip_html(input));
    if text.chars().count() > HARD_CONTENT_CAP {
        text.chars().take(HARD_CONTENT_CAP).collect()
    } else {
        text
    }
}

/// Truncate content exceeding `max_len` characters, appending the marker
///
/// Content at or under the limit is returned untouched; over-limit content
/// becomes exactly `max_len` characters plus [`TRUNCATION_MARKER`].
pub fn truncate_content(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        return content.to_string();
    }
    let mut out: String = content.chars().take(max_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Parse a heterogeneous date representation, falling back to now
///
/// Tried in order: RFC 2822 (feed `pubDate`), RFC 3339 (Atom timestamps),
/// `%Y-%m-%d %H:%M:%S`, bare `%Y-%m-%d`. Anything else falls back to the
/// current time with a warning.
pub fn parse_published(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Utc::now();
    };

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Utc.from_utc_datetime(&naive);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&naive);
        }
    }

    tracing::warn!(value = raw, "unparseable published date, using now");
    Utc::now()
}
