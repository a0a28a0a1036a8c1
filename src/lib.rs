//! siphon - Signal Ingestion Engine
//!
//! A polling engine for heterogeneous external content sources (feeds,
//! future API/scraper types): per-source recurring schedules, sliding
//! one-minute rate limiting, backoff on failure, automatic resurrection of
//! failed sources, and a typed notification channel for downstream
//! consumers.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Engine configuration and the source manifest
//! - [`models`] - Core data structures (sources, items, poll outcomes)
//! - [`adapter`] - Per-source-type fetch plus the shared polling lifecycle
//! - [`extract`] - Validation, normalization and enrichment of raw items
//! - [`scheduler`] - Fleet lifecycle, recurring jobs, health and retry loops
//! - [`events`] - Notification channel broadcast to external consumers
//! - [`server`] - Read-only HTTP status surface
//! - [`metrics`] - Prometheus metrics
//! - [`error`] - Unified error handling
//!
//! # Example
//!
//! ```no_run
//! use siphon::config::{EngineConfig, SourceManifest};
//! use siphon::scheduler::SignalScheduler;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let scheduler = SignalScheduler::new(config);
//!
//!     let manifest = SourceManifest::from_file("sources.toml")?;
//!     for source in manifest.sources {
//!         scheduler.add_source(source).await?;
//!     }
//!
//!     let mut events = scheduler.subscribe();
//!     scheduler.start().await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{}", event.kind());
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod server;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::adapter::{AdapterHarness, SourceAdapter};
    pub use crate::config::{EngineConfig, SourceManifest};
    pub use crate::error::{Error, ErrorCategory, FetchError, RegistrationError, Result};
    pub use crate::events::{EventBus, SignalEvent};
    pub use crate::models::{
        PollOutcome, Source, SourceStatus, SourceType, SignalItem, TrustLevel,
    };
    pub use crate::scheduler::{SchedulePattern, SchedulerStats, SignalScheduler, SourceUpdate};
}

// Direct re-exports for convenience
pub use models::{PollOutcome, SignalItem, Source, SourceStatus, SourceType};
pub use scheduler::SignalScheduler;
