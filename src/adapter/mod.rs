//! Adapter framework: per-source fetch plus the shared polling lifecycle
//!
//! One adapter instance exists per source. The source-type-specific part is
//! the [`SourceAdapter`] trait (`poll()` returns a raw payload); everything
//! around it — rate-limit gate, validation/normalization, event emission,
//! error classification, the consecutive-error streak and the `should_poll`
//! timing gates — lives in [`AdapterHarness`] and is shared by every source
//! type.
//!
//! Harness state (rate window, error streak, poll history) is private to
//! the instance; the scheduler reads it through accessors and never writes
//! it, except through [`AdapterHarness::reset_error_state`] on the retry
//! path.

pub mod feed;
pub mod http;
pub mod rate_limit;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, Utc, Weekday};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::error::{FetchError, RegistrationError};
use crate::events::{EventBus, SignalEvent};
use crate::extract::normalize_item;
use crate::metrics;
use crate::models::{PollFailure, PollOutcome, RawPayload, Source, SourceType};

pub use feed::FeedAdapter;
pub use rate_limit::RateWindow;

/// Polls retained per adapter for health scoring
pub const HISTORY_CAP: usize = 20;

/// Source-type-specific fetch operation
///
/// Implementations fetch and minimally shape raw data; they never touch
/// lifecycle state. The harness wraps every call.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The source type this adapter serves
    fn source_type(&self) -> SourceType;

    /// Fetch the source once and return its raw items
    async fn poll(&self) -> Result<RawPayload, FetchError>;
}

/// Construct the adapter for a source's type
///
/// Unsupported types are a registration-time error, never deferred to the
/// first poll.
pub fn build_adapter(
    source: &Source,
    user_agent: &str,
) -> Result<Box<dyn SourceAdapter>, RegistrationError> {
    match source.source_type {
        SourceType::Feed => Ok(Box::new(FeedAdapter::new(source, user_agent)?)),
        other => Err(RegistrationError::UnsupportedType(other.as_str().to_string())),
    }
}

/// One poll attempt, as remembered for health scoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollRecord {
    pub at: DateTime<Utc>,
    pub success: bool,
}

/// Read-only view of an adapter's private counters
#[derive(Debug, Clone)]
pub struct AdapterState {
    pub consecutive_errors: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub history: Vec<PollRecord>,
    pub is_polling: bool,
}

/// Shared, non-overridable polling lifecycle around a [`SourceAdapter`]
pub struct AdapterHarness {
    source_id: String,
    source: Arc<RwLock<Source>>,
    adapter: Box<dyn SourceAdapter>,
    limiter: RateWindow,
    events: EventBus,

    poll_seq: AtomicU64,
    consecutive_errors: AtomicU32,
    is_polling: AtomicBool,
    last_error_at: Mutex<Option<DateTime<Utc>>>,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
    history: Mutex<VecDeque<PollRecord>>,
}

impl AdapterHarness {
    /// Wrap an adapter with the shared lifecycle state
    ///
    /// `initial` is the source record at registration time; the shared
    /// `source` lock is consulted for config on every poll so updates flow
    /// through without rebuilding the harness.
    pub fn new(
        initial: &Source,
        source: Arc<RwLock<Source>>,
        adapter: Box<dyn SourceAdapter>,
        events: EventBus,
    ) -> Self {
        Self {
            source_id: initial.id.clone(),
            source,
            adapter,
            limiter: RateWindow::per_minute(initial.polling.requests_per_minute),
            events,
            poll_seq: AtomicU64::new(0),
            consecutive_errors: AtomicU32::new(0),
            is_polling: AtomicBool::new(false),
            last_error_at: Mutex::new(None),
            last_success_at: Mutex::new(None),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAP)),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::SeqCst)
    }

    /// Snapshot of the private counters for status reporting
    pub fn state(&self) -> AdapterState {
        AdapterState {
            consecutive_errors: self.consecutive_errors(),
            last_success_at: *self.last_success_at.lock().expect("last_success lock"),
            last_error_at: *self.last_error_at.lock().expect("last_error lock"),
            history: self
                .history
                .lock()
                .expect("history lock")
                .iter()
                .copied()
                .collect(),
            is_polling: self.is_polling.load(Ordering::SeqCst),
        }
    }

    /// Clear the error streak and backoff window
    ///
    /// Called on the retry path when a failed source is resurrected; the
    /// retry loop wins over any remaining backoff window.
    pub fn reset_error_state(&self) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
        *self.last_error_at.lock().expect("last_error lock") = None;
    }

    /// Timing gates checked by the scheduler before `execute_poll`
    ///
    /// Returns false outside configured `active_hours`, on weekends when
    /// `skip_weekends` is set, or while the adapter is inside its backoff
    /// window (`retry_backoff_minutes` since the last error).
    pub async fn should_poll(&self, now: DateTime<Local>) -> bool {
        let polling = {
            let source = self.source.read().await;
            source.polling.clone()
        };

        if let Some(hours) = &polling.active_hours {
            if !hours.contains(now.time()) {
                tracing::debug!(source = %self.source_id, "outside active hours");
                return false;
            }
        }

        if polling.skip_weekends
            && matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
        {
            tracing::debug!(source = %self.source_id, "skipping weekend poll");
            return false;
        }

        if self.consecutive_errors() > 0 {
            let last_error = *self.last_error_at.lock().expect("last_error lock");
            if let Some(last_error) = last_error {
                let resume_at =
                    last_error + ChronoDuration::minutes(i64::from(polling.retry_backoff_minutes));
                if now.with_timezone(&Utc) < resume_at {
                    tracing::debug!(
                        source = %self.source_id,
                        resume_at = %resume_at,
                        "inside backoff window"
                    );
                    return false;
                }
            }
        }

        true
    }

    /// Run one complete poll cycle
    ///
    /// Rate-limit gate, fetch, per-item validation/normalization, event and
    /// metrics emission, error classification. Failures are captured in the
    /// returned [`PollOutcome`], never propagated — repeated ones only
    /// accumulate in the streak counter the scheduler reads.
    pub async fn execute_poll(&self) -> PollOutcome {
        self.is_polling.store(true, Ordering::SeqCst);
        let outcome = self.execute_poll_inner().await;
        self.is_polling.store(false, Ordering::SeqCst);
        outcome
    }

    async fn execute_poll_inner(&self) -> PollOutcome {
        let seq = self.poll_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let poll_id = format!("{}:{}", self.source_id, seq);
        let started = Instant::now();

        // gate before any network access, against the current limit
        let requests_per_minute = self.source.read().await.polling.requests_per_minute;
        self.limiter.acquire_with_limit(requests_per_minute).await;

        let result = self.adapter.poll().await;
        let source = self.source.read().await.clone();
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(payload) => {
                let total_items = payload.items.len();
                let items: Vec<_> = payload
                    .items
                    .into_iter()
                    .filter_map(|raw| normalize_item(raw, &source, &poll_id))
                    .collect();
                let valid_items = items.len();

                self.consecutive_errors.store(0, Ordering::SeqCst);
                *self.last_success_at.lock().expect("last_success lock") = Some(Utc::now());
                self.push_history(true);

                tracing::info!(
                    source = %self.source_id,
                    poll = %poll_id,
                    total_items,
                    valid_items,
                    duration_ms,
                    "poll succeeded"
                );

                self.events.publish(SignalEvent::PollSuccess {
                    source_id: self.source_id.clone(),
                    poll_id: poll_id.clone(),
                    items_found: valid_items,
                    processing_time_ms: duration_ms,
                });
                self.events.publish(SignalEvent::MetricsUpdate {
                    source_id: self.source_id.clone(),
                    success: true,
                    items_found: Some(total_items),
                    valid_items: Some(valid_items),
                    processing_time_ms: Some(duration_ms),
                });
                metrics::record_poll(&self.source_id, "success", duration_ms);
                metrics::record_items(&self.source_id, valid_items as u64);

                PollOutcome {
                    poll_id,
                    items,
                    total_items,
                    valid_items,
                    duration_ms,
                    failure: None,
                }
            }
            Err(err) => {
                let streak = self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
                *self.last_error_at.lock().expect("last_error lock") = Some(Utc::now());
                self.push_history(false);

                let failure = PollFailure {
                    error_type: err.error_type().to_string(),
                    message: err.to_string(),
                    http_status: err.http_status(),
                };

                tracing::warn!(
                    source = %self.source_id,
                    poll = %poll_id,
                    error_type = %failure.error_type,
                    consecutive_errors = streak,
                    duration_ms,
                    "poll failed: {}",
                    failure.message
                );

                self.events.publish(SignalEvent::PollError {
                    source_id: self.source_id.clone(),
                    poll_id: poll_id.clone(),
                    error_type: failure.error_type.clone(),
                    error_message: failure.message.clone(),
                    consecutive_errors: streak,
                    processing_time_ms: duration_ms,
                    http_status: failure.http_status,
                });
                self.events.publish(SignalEvent::MetricsUpdate {
                    source_id: self.source_id.clone(),
                    success: false,
                    items_found: None,
                    valid_items: None,
                    processing_time_ms: Some(duration_ms),
                });
                metrics::record_poll(&self.source_id, "failure", duration_ms);

                PollOutcome {
                    poll_id,
                    items: Vec::new(),
                    total_items: 0,
                    valid_items: 0,
                    duration_ms,
                    failure: Some(failure),
                }
            }
        }
    }

    fn push_history(&self, success: bool) {
        let mut history = self.history.lock().expect("history lock");
        if history.len() == HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(PollRecord {
            at: Utc::now(),
            success,
        });
    }
}
