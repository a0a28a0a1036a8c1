// Core data structures for the siphon ingestion engine

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::RegistrationError;

/// Minimum accepted polling interval in minutes
pub const MIN_INTERVAL_MINUTES: u32 = 5;
/// Maximum accepted polling interval in minutes (one day)
pub const MAX_INTERVAL_MINUTES: u32 = 1440;
/// Source `trust_score` above which items are stamped `reliable`
pub const RELIABLE_TRUST_THRESHOLD: f64 = 0.7;

/// Kind of external content origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// RSS 2.0 / Atom feed
    Feed,
    /// Structured HTTP API (no adapter yet)
    Api,
    /// HTML scraper (no adapter yet)
    Scraper,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Api => "api",
            Self::Scraper => "scraper",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "feed" | "rss" | "atom" => Some(Self::Feed),
            "api" => Some(Self::Api),
            "scraper" => Some(Self::Scraper),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime status of a registered source
///
/// Transitions: `active → error` when the consecutive-failure threshold is
/// exceeded, `error → active` via the retry loop, `active ⇄ inactive` via
/// explicit configuration update. Nothing else is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wall-clock window during which a source may be polled
///
/// Times are `HH:MM` in local time. A window whose end precedes its start
/// wraps past midnight (e.g. 22:00–06:00).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHours {
    pub start: String,
    pub end: String,
}

impl ActiveHours {
    /// Parse both bounds, rejecting anything that is not HH:MM
    pub fn parse(&self) -> Result<(NaiveTime, NaiveTime), RegistrationError> {
        let start = NaiveTime::parse_from_str(&self.start, "%H:%M")
            .map_err(|_| RegistrationError::InvalidActiveHours(self.start.clone()))?;
        let end = NaiveTime::parse_from_str(&self.end, "%H:%M")
            .map_err(|_| RegistrationError::InvalidActiveHours(self.end.clone()))?;
        Ok((start, end))
    }

    /// Check whether a wall-clock time falls inside the window
    pub fn contains(&self, t: NaiveTime) -> bool {
        match self.parse() {
            Ok((start, end)) => {
                if start <= end {
                    t >= start && t < end
                } else {
                    // wraps midnight
                    t >= start || t < end
                }
            }
            // unparseable windows never block polling; validation catches
            // them at registration
            Err(_) => true,
        }
    }
}

/// Per-source polling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Minutes between polls, [5, 1440]
    pub interval_minutes: u32,

    /// Optional wall-clock polling window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_hours: Option<ActiveHours>,

    /// Skip polling on Saturday and Sunday
    #[serde(default)]
    pub skip_weekends: bool,

    /// Cooldown after a failure before the schedule resumes
    #[serde(default = "default_retry_backoff_minutes")]
    pub retry_backoff_minutes: u32,

    /// Consecutive failures before the source is demoted to `error`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Requests admitted per sliding one-minute window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Per-fetch timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_retry_backoff_minutes() -> u32 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_requests_per_minute() -> u32 {
    10
}
fn default_timeout_seconds() -> u64 {
    30
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            active_hours: None,
            skip_weekends: false,
            retry_backoff_minutes: default_retry_backoff_minutes(),
            max_retries: default_max_retries(),
            requests_per_minute: default_requests_per_minute(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Per-source content extraction policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Items with less normalized content than this are dropped
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Content longer than this is truncated with a marker
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Language stamped on items that carry none of their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_language: Option<String>,
}

fn default_min_content_length() -> usize {
    80
}
fn default_max_content_length() -> usize {
    2000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_content_length: default_min_content_length(),
            max_content_length: default_max_content_length(),
            expected_language: None,
        }
    }
}

/// Credential scheme for a source
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// Unauthenticated source
    #[default]
    None,
    /// Key sent in a named request header
    ApiKey { header: String, key: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// `Authorization: Basic <credentials>`
    Basic { username: String, password: String },
}

/// Auth policy: a credential scheme plus arbitrary custom headers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub scheme: AuthScheme,

    /// Extra headers sent verbatim on every fetch
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// A configured external content origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,

    #[serde(rename = "type")]
    pub source_type: SourceType,

    #[serde(default)]
    pub status: SourceStatus,

    pub polling: PollingConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Source reliability rating, [0, 1]
    #[serde(default = "default_trust_score")]
    pub trust_score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_poll_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_poll_at: Option<DateTime<Utc>>,
}

fn default_trust_score() -> f64 {
    0.5
}

impl Source {
    /// Validate the registration-time invariants
    ///
    /// Violations are synchronous registration errors, never deferred.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.id.trim().is_empty() {
            return Err(RegistrationError::MissingField("id"));
        }
        if self.name.trim().is_empty() {
            return Err(RegistrationError::MissingField("name"));
        }
        if self.url.trim().is_empty() {
            return Err(RegistrationError::MissingField("url"));
        }
        if url::Url::parse(&self.url).is_err() {
            return Err(RegistrationError::InvalidUrl(self.url.clone()));
        }
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&self.polling.interval_minutes)
        {
            return Err(RegistrationError::IntervalOutOfRange(
                self.polling.interval_minutes,
            ));
        }
        if !(0.0..=1.0).contains(&self.trust_score) {
            return Err(RegistrationError::InvalidTrustScore(self.trust_score));
        }
        if self.polling.requests_per_minute == 0 {
            return Err(RegistrationError::InvalidValue {
                field: "requests_per_minute",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.polling.timeout_seconds == 0 {
            return Err(RegistrationError::InvalidValue {
                field: "timeout_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(hours) = &self.polling.active_hours {
            hours.parse()?;
        }
        Ok(())
    }

    /// Trust level stamped onto items this source produces
    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.trust_score)
    }
}

/// Inferred topic of a signal item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ProductLaunch,
    Funding,
    Acquisition,
    Partnership,
    LeadershipChange,
    Regulation,
    SecurityIncident,
    Hiring,
    MarketTrend,
    CompetitiveAnalysis,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductLaunch => "product_launch",
            Self::Funding => "funding",
            Self::Acquisition => "acquisition",
            Self::Partnership => "partnership",
            Self::LeadershipChange => "leadership_change",
            Self::Regulation => "regulation",
            Self::SecurityIncident => "security_incident",
            Self::Hiring => "hiring",
            Self::MarketTrend => "market_trend",
            Self::CompetitiveAnalysis => "competitive_analysis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "product_launch" => Some(Self::ProductLaunch),
            "funding" => Some(Self::Funding),
            "acquisition" => Some(Self::Acquisition),
            "partnership" => Some(Self::Partnership),
            "leadership_change" => Some(Self::LeadershipChange),
            "regulation" => Some(Self::Regulation),
            "security_incident" => Some(Self::SecurityIncident),
            "hiring" => Some(Self::Hiring),
            "market_trend" => Some(Self::MarketTrend),
            "competitive_analysis" => Some(Self::CompetitiveAnalysis),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Urgency of a signal item; refined by downstream consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Reliability stamp derived from the source trust score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Reliable,
    Unverified,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        if score > RELIABLE_TRUST_THRESHOLD {
            Self::Reliable
        } else {
            Self::Unverified
        }
    }
}

/// Processing state of a signal item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Freshly ingested, not yet enriched
    #[default]
    Raw,
    /// Enriched downstream
    Enriched,
    /// Archived downstream
    Archived,
}

/// One normalized, validated unit of content discovered during a poll
///
/// Immutable once created; ownership passes to whatever consumes the
/// notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub trust_level: TrustLevel,
    pub status: ItemStatus,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    // provenance
    pub source_id: String,
    pub poll_id: String,
    pub discovered_at: DateTime<Utc>,
}

impl SignalItem {
    /// Fresh unique item identifier
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Raw item shape handed up by a source-type adapter
///
/// Every field is optional at this stage; validation decides what survives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
}

/// Structured payload returned by one adapter `poll()`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPayload {
    pub items: Vec<RawItem>,
}

/// Classified failure of one poll invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollFailure {
    pub error_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

/// Ephemeral result of one poll invocation
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub poll_id: String,
    pub items: Vec<SignalItem>,
    /// Raw items the adapter returned, before validation
    pub total_items: usize,
    /// Items that survived validation (always ≤ `total_items`)
    pub valid_items: usize,
    pub duration_ms: u64,
    pub failure: Option<PollFailure>,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}
