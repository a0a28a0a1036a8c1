//! Keyword extraction for signal items
//!
//! Cheap lexical pass: lowercase, strip punctuation, split on whitespace,
//! drop short tokens and stop-words, keep the first ten unique tokens in
//! order of appearance.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum keywords stamped onto one item
pub const MAX_KEYWORDS: usize = 10;

/// Tokens ignored regardless of length
const STOP_WORDS: &[&str] = &[
    "about", "after", "against", "also", "among", "been", "before", "being", "between", "both",
    "could", "does", "doing", "during", "each", "from", "have", "having", "here", "into", "its",
    "itself", "just", "more", "most", "only", "other", "over", "same", "should", "some", "such",
    "than", "that", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "under", "until", "very", "was", "were", "what", "when", "where", "which", "while", "will",
    "with", "would", "your",
];

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("punctuation regex"))
}

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Extract up to [`MAX_KEYWORDS`] deduplicated keywords from free text
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = punctuation_re().replace_all(&lowered, "");

    let mut keywords: Vec<String> = Vec::with_capacity(MAX_KEYWORDS);
    for token in stripped.split_whitespace() {
        let token = token.trim_matches('-');
        if token.len() <= 3 || is_stop_word(token) {
            continue;
        }
        if keywords.iter().any(|k| k == token) {
            continue;
        }
        keywords.push(token.to_string());
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}
