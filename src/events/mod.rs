//! Notification channel for ingestion lifecycle events
//!
//! Adapters and the scheduler broadcast their lifecycle events
//! (poll succeeded/failed, items discovered, health snapshots) here so
//! external collaborators can observe the fleet without being coupled to
//! it. Delivery is fan-out over a `tokio::sync::broadcast` channel:
//! publishing never blocks and never fails, subscribers that fall behind
//! lose the oldest events first.
//!
//! Consumers must not assume a total order across sources; the only
//! ordering guarantee is per-source monotonic `poll_id` sequencing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::SignalItem;
use crate::scheduler::health::HealthSnapshot;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Provenance metadata attached to an `items_ingested` batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestMetadata {
    pub poll_id: String,
    pub source_name: String,
    pub discovered_at: DateTime<Utc>,
}

/// Lifecycle events published on the notification channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SignalEvent {
    /// One poll completed and produced a payload
    PollSuccess {
        source_id: String,
        poll_id: String,
        items_found: usize,
        processing_time_ms: u64,
    },

    /// One poll failed with a classified error
    PollError {
        source_id: String,
        poll_id: String,
        error_type: String,
        error_message: String,
        consecutive_errors: u32,
        processing_time_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        http_status: Option<u16>,
    },

    /// Lightweight per-poll metrics sample
    MetricsUpdate {
        source_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        items_found: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        valid_items: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        processing_time_ms: Option<u64>,
    },

    /// Normalized items republished for external consumption
    ItemsIngested {
        source_id: String,
        items: Vec<SignalItem>,
        metadata: IngestMetadata,
    },

    /// A source exhausted its retry budget and was demoted to `error`
    SourceFailed { source_id: String, error: String },

    /// Fleet-wide health snapshot from the monitoring loop
    HealthCheck(HealthSnapshot),
}

impl SignalEvent {
    /// Stable event name for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PollSuccess { .. } => "poll_success",
            Self::PollError { .. } => "poll_error",
            Self::MetricsUpdate { .. } => "metrics_update",
            Self::ItemsIngested { .. } => "items_ingested",
            Self::SourceFailed { .. } => "source_failed",
            Self::HealthCheck(_) => "health_check",
        }
    }

    /// Source id the event concerns, if it concerns exactly one
    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::PollSuccess { source_id, .. }
            | Self::PollError { source_id, .. }
            | Self::MetricsUpdate { source_id, .. }
            | Self::ItemsIngested { source_id, .. }
            | Self::SourceFailed { source_id, .. } => Some(source_id),
            Self::HealthCheck(_) => None,
        }
    }
}

/// Publish/subscribe bus carrying [`SignalEvent`]s
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SignalEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast an event to all current subscribers
    ///
    /// Fire-and-forget: an event published with no subscribers is dropped,
    /// not an error.
    pub fn publish(&self, event: SignalEvent) {
        tracing::trace!(event = event.kind(), source = ?event.source_id(), "event published");
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}
