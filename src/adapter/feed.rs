//! Feed adapter: RSS 2.0 and Atom sources
//!
//! The one concrete source-type adapter. Fetches the source URL with the
//! configured client and auth headers, decodes the body honoring the
//! Content-Type charset, and parses it into the raw payload shape. A body
//! that is neither RSS nor Atom is an `invalid_payload` fetch error for
//! that poll.

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;

use crate::adapter::http::{auth_headers, build_client};
use crate::adapter::SourceAdapter;
use crate::error::{FetchError, RegistrationError};
use crate::models::{RawItem, RawPayload, Source, SourceType};

// ============================================================================
// RSS 2.0 document shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    language: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded")]
    content: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    author: Option<String>,
    #[serde(rename = "creator")]
    creator: Option<String>,
}

// ============================================================================
// Atom document shape
// ============================================================================

/// Atom text constructs may carry a `type` attribute; only the text matters
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    published: Option<String>,
    updated: Option<String>,
    author: Option<AtomAuthor>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter polling one RSS/Atom feed source
pub struct FeedAdapter {
    url: String,
    client: Client,
    headers: HeaderMap,
}

impl FeedAdapter {
    /// Build the adapter and its transport from a validated source record
    pub fn new(source: &Source, user_agent: &str) -> Result<Self, RegistrationError> {
        Ok(Self {
            url: source.url.clone(),
            client: build_client(&source.polling, user_agent)?,
            headers: auth_headers(&source.auth)?,
        })
    }

    /// Decode the response body honoring an explicit Content-Type charset
    ///
    /// Bodies without a charset (or with an unknown label) are decoded as
    /// UTF-8; decoding errors are fatal for the poll.
    fn decode_body(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
        let encoding = content_type
            .to_lowercase()
            .split("charset=")
            .nth(1)
            .map(|label| label.split(';').next().unwrap_or(label).trim().to_string())
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);

        let (text, _, had_errors) = encoding.decode(bytes);
        if had_errors {
            return Err(FetchError::Decode(format!(
                "body is not valid {}",
                encoding.name()
            )));
        }
        Ok(text.into_owned())
    }

    /// Parse a feed document into the raw payload shape
    fn parse_feed(body: &str) -> Result<RawPayload, FetchError> {
        let head: String = body.chars().take(1024).collect::<String>().to_lowercase();

        if head.contains("<rss") || head.contains("<rdf") {
            let rss: Rss = quick_xml::de::from_str(body)
                .map_err(|e| FetchError::InvalidPayload(format!("rss parse: {e}")))?;
            Ok(Self::payload_from_rss(rss))
        } else if head.contains("<feed") {
            let feed: AtomFeed = quick_xml::de::from_str(body)
                .map_err(|e| FetchError::InvalidPayload(format!("atom parse: {e}")))?;
            Ok(Self::payload_from_atom(feed))
        } else {
            Err(FetchError::InvalidPayload(
                "body is neither RSS nor Atom".to_string(),
            ))
        }
    }

    fn payload_from_rss(rss: Rss) -> RawPayload {
        let language = rss.channel.language;
        let items = rss
            .channel
            .items
            .into_iter()
            .map(|item| RawItem {
                title: item.title,
                url: item.link,
                summary: item.description.clone(),
                content: item.content.or(item.description),
                published_at: item.pub_date,
                author: item.creator.or(item.author),
                language: language.clone(),
            })
            .collect();
        RawPayload { items }
    }

    fn payload_from_atom(feed: AtomFeed) -> RawPayload {
        let items = feed
            .entries
            .into_iter()
            .map(|entry| {
                // prefer rel="alternate" (or rel-less) links
                let url = entry
                    .links
                    .iter()
                    .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                    .or_else(|| entry.links.first())
                    .and_then(|l| l.href.clone());
                let summary = entry.summary.and_then(|t| t.value);
                RawItem {
                    title: entry.title.and_then(|t| t.value),
                    url,
                    summary: summary.clone(),
                    content: entry.content.and_then(|t| t.value).or(summary),
                    published_at: entry.published.or(entry.updated),
                    author: entry.author.and_then(|a| a.name),
                    language: None,
                }
            })
            .collect();
        RawPayload { items }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Feed
    }

    async fn poll(&self) -> Result<RawPayload, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        let body = Self::decode_body(&bytes, &content_type)?;
        Self::parse_feed(&body)
    }
}
