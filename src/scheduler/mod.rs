//! Fleet scheduler: source lifecycle, recurring polls, monitoring loops
//!
//! The scheduler owns the source registry and the fleet statistics; nothing
//! else mutates them. Each active source gets one spawned recurring job
//! that fires immediately and then on every tick of its converted schedule.
//! Two background loops run on their own timers: health monitoring (purely
//! observational) and failed-source retry (the only `error → active` path).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │      SignalScheduler                         │
//! │  - source registry (exclusive mutation)      │
//! │  - per-source recurring jobs                 │
//! │  - fleet counters and snapshots              │
//! │  - health monitor + retry loops              │
//! └──────────────────────────────────────────────┘
//!            │ executes                │ publishes
//!            ▼                         ▼
//!   ┌─────────────────┐      ┌──────────────────┐
//!   │ AdapterHarness  │ ───▶ │   EventBus       │
//!   │ (one per source)│      │ (poll + fleet    │
//!   └─────────────────┘      │  lifecycle)      │
//!                            └──────────────────┘
//! ```

pub mod health;
pub mod interval;
pub mod retry;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::adapter::{build_adapter, AdapterHarness};
use crate::config::EngineConfig;
use crate::error::{RegistrationError, Result, SchedulerError};
use crate::events::{EventBus, IngestMetadata, SignalEvent};
use crate::metrics;
use crate::models::{
    AuthConfig, ExtractionConfig, PollOutcome, PollingConfig, Source, SourceStatus, SourceType,
};

pub use health::{HealthSnapshot, SourceHealth, UNHEALTHY_THRESHOLD};
pub use interval::SchedulePattern;

// ============================================================================
// Snapshot types
// ============================================================================

/// Fleet-wide poll counters, mutated only by the scheduler
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FleetCounters {
    pub total_polls: u64,
    pub successful_polls: u64,
    pub failed_polls: u64,
    pub items_ingested: u64,
}

/// Read-only fleet snapshot returned by [`SignalScheduler::get_stats`]
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub is_running: bool,
    pub total_sources: usize,
    pub active_sources: usize,
    pub inactive_sources: usize,
    pub failed_sources: usize,
    pub total_polls: u64,
    pub successful_polls: u64,
    pub failed_polls: u64,
    pub items_ingested: u64,
    /// successful_polls / total_polls, 0 when nothing has been polled
    pub success_rate: f64,
    /// items_ingested / total_polls, 0 when nothing has been polled
    pub avg_items_per_poll: f64,
}

/// Per-source status row returned by [`SignalScheduler::get_source_statuses`]
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatusReport {
    pub id: String,
    pub name: String,
    pub status: SourceStatus,
    pub schedule: String,
    pub health_score: f64,
    pub last_poll: Option<DateTime<Utc>>,
    pub next_poll: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub is_polling: bool,
}

/// Partial change set applied by [`SignalScheduler::update_source`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<SourceType>,
    pub status: Option<SourceStatus>,
    pub polling: Option<PollingConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub auth: Option<AuthConfig>,
    pub trust_score: Option<f64>,
}

// ============================================================================
// Registry internals
// ============================================================================

/// One registered source with its adapter and schedule
struct SourceEntry {
    source: Arc<RwLock<Source>>,
    harness: Arc<AdapterHarness>,
    pattern: SchedulePattern,
    /// Bumped on update/resurrect; in-flight polls from an older generation
    /// discard their results
    generation: u64,
    job: Option<JoinHandle<()>>,
}

pub(crate) struct Inner {
    pub(crate) config: EngineConfig,
    pub(crate) sources: RwLock<HashMap<String, SourceEntry>>,
    pub(crate) counters: RwLock<FleetCounters>,
    pub(crate) events: EventBus,
    permits: Semaphore,
    pub(crate) running: AtomicBool,
    next_generation: AtomicU64,
    monitors: StdMutex<Vec<JoinHandle<()>>>,
}

/// Owner of the source fleet
///
/// Cheap to clone; clones share the registry, counters and event channel.
#[derive(Clone)]
pub struct SignalScheduler {
    inner: Arc<Inner>,
}

impl SignalScheduler {
    pub fn new(config: EngineConfig) -> Self {
        let events = EventBus::new(config.scheduler.event_buffer);
        let permits = Semaphore::new(config.scheduler.max_concurrent_sources.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                sources: RwLock::new(HashMap::new()),
                counters: RwLock::new(FleetCounters::default()),
                events,
                permits,
                running: AtomicBool::new(false),
                next_generation: AtomicU64::new(1),
                monitors: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribe to the outward notification channel
    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Source lifecycle
    // ------------------------------------------------------------------

    /// Register a source and, if the scheduler is running and the source is
    /// active, start its recurring job immediately
    pub async fn add_source(&self, source: Source) -> Result<()> {
        source.validate()?;

        let mut sources = self.inner.sources.write().await;
        if sources.contains_key(&source.id) {
            return Err(RegistrationError::DuplicateSource(source.id).into());
        }

        let adapter = build_adapter(&source, &self.inner.config.http.user_agent)?;
        let pattern = SchedulePattern::from_interval_minutes(source.polling.interval_minutes);
        let shared = Arc::new(RwLock::new(source.clone()));
        let harness = Arc::new(AdapterHarness::new(
            &source,
            shared.clone(),
            adapter,
            self.inner.events.clone(),
        ));

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut entry = SourceEntry {
            source: shared,
            harness,
            pattern,
            generation,
            job: None,
        };

        if self.is_running() && source.status == SourceStatus::Active {
            entry.job = Some(Self::spawn_job(
                &self.inner,
                source.id.clone(),
                generation,
                pattern,
            ));
        }

        tracing::info!(source = %source.id, schedule = %pattern, "source registered");
        sources.insert(source.id.clone(), entry);
        Self::refresh_gauges(&sources).await;
        Ok(())
    }

    /// Deregister a source, halting its schedule first
    ///
    /// A poll already in flight completes but its result is discarded.
    pub async fn remove_source(&self, id: &str) -> Result<()> {
        let mut sources = self.inner.sources.write().await;
        let Some(mut entry) = sources.remove(id) else {
            return Err(SchedulerError::UnknownSource(id.to_string()).into());
        };
        if let Some(job) = entry.job.take() {
            job.abort();
        }
        tracing::info!(source = id, "source removed");
        Self::refresh_gauges(&sources).await;
        Ok(())
    }

    /// Apply a validated partial update to a registered source
    ///
    /// The existing schedule stops, changes apply, the adapter is recreated
    /// only when the source type changed, and the source is rescheduled if
    /// the result is active.
    pub async fn update_source(&self, id: &str, update: SourceUpdate) -> Result<()> {
        let mut sources = self.inner.sources.write().await;
        let entry = sources
            .get_mut(id)
            .ok_or_else(|| SchedulerError::UnknownSource(id.to_string()))?;

        let mut updated = entry.source.read().await.clone();
        let previous_status = updated.status;

        if let Some(name) = update.name {
            updated.name = name;
        }
        if let Some(url) = update.url {
            updated.url = url;
        }
        if let Some(polling) = update.polling {
            updated.polling = polling;
        }
        if let Some(extraction) = update.extraction {
            updated.extraction = extraction;
        }
        if let Some(auth) = update.auth {
            updated.auth = auth;
        }
        if let Some(trust) = update.trust_score {
            updated.trust_score = trust;
        }
        let type_changed = update
            .source_type
            .is_some_and(|t| t != updated.source_type);
        if let Some(source_type) = update.source_type {
            updated.source_type = source_type;
        }
        if let Some(status) = update.status {
            // only active ⇄ inactive may be requested explicitly
            if status == SourceStatus::Error {
                return Err(SchedulerError::InvalidTransition {
                    from: previous_status.to_string(),
                    to: status.to_string(),
                }
                .into());
            }
            updated.status = status;
        }

        updated.validate()?;

        // stop the existing schedule; older in-flight polls will miss the
        // generation check and discard themselves
        if let Some(job) = entry.job.take() {
            job.abort();
        }
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        entry.generation = generation;
        entry.pattern = SchedulePattern::from_interval_minutes(updated.polling.interval_minutes);

        if type_changed {
            let adapter = build_adapter(&updated, &self.inner.config.http.user_agent)?;
            entry.harness = Arc::new(AdapterHarness::new(
                &updated,
                entry.source.clone(),
                adapter,
                self.inner.events.clone(),
            ));
        }

        *entry.source.write().await = updated.clone();

        if self.is_running() && updated.status == SourceStatus::Active {
            entry.job = Some(Self::spawn_job(
                &self.inner,
                id.to_string(),
                generation,
                entry.pattern,
            ));
        }

        tracing::info!(source = id, schedule = %entry.pattern, "source updated");
        Self::refresh_gauges(&sources).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Run control
    // ------------------------------------------------------------------

    /// Start all active sources' schedules plus the monitoring loops
    pub async fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning.into());
        }

        let mut sources = self.inner.sources.write().await;
        for (id, entry) in sources.iter_mut() {
            let status = entry.source.read().await.status;
            if status == SourceStatus::Active && entry.job.is_none() {
                entry.job = Some(Self::spawn_job(
                    &self.inner,
                    id.clone(),
                    entry.generation,
                    entry.pattern,
                ));
            }
        }
        drop(sources);

        self.spawn_monitors();
        tracing::info!("scheduler started");
        Ok(())
    }

    /// Stop every schedule and both monitoring loops
    ///
    /// In-flight polls are allowed to complete; their results are discarded
    /// if their source is gone by then.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        let monitors: Vec<_> = self
            .inner
            .monitors
            .lock()
            .expect("monitors lock")
            .drain(..)
            .collect();
        for handle in &monitors {
            handle.abort();
        }
        futures::future::join_all(monitors).await;

        let mut sources = self.inner.sources.write().await;
        for entry in sources.values_mut() {
            if let Some(job) = entry.job.take() {
                job.abort();
            }
        }
        tracing::info!("scheduler stopped");
    }

    // ------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------

    /// Poll one source now, subject to the same gates as its schedule
    ///
    /// Polling an `inactive` or `error` source is a no-op, not an error;
    /// only an unknown id is rejected.
    pub async fn poll_source(&self, id: &str) -> Result<()> {
        {
            let sources = self.inner.sources.read().await;
            if !sources.contains_key(id) {
                return Err(SchedulerError::UnknownSource(id.to_string()).into());
            }
        }
        Self::poll_source_inner(&self.inner, id, None).await;
        Ok(())
    }

    /// Recurring job body. Returns false when the job must stop (source
    /// removed, superseded, or demoted).
    async fn poll_source_inner(inner: &Arc<Inner>, id: &str, expected_gen: Option<u64>) -> bool {
        let harness = {
            let sources = inner.sources.read().await;
            let Some(entry) = sources.get(id) else {
                return false;
            };
            if let Some(generation) = expected_gen {
                if entry.generation != generation {
                    return false;
                }
            }
            if entry.source.read().await.status != SourceStatus::Active {
                // no-op, keep the schedule alive
                return true;
            }
            entry.harness.clone()
        };

        if !harness.should_poll(Local::now()).await {
            return true;
        }

        // admission gate: bounds simultaneously in-flight polls fleet-wide
        let permit = match inner.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return false,
        };
        let outcome = harness.execute_poll().await;
        drop(permit);

        Self::commit_outcome(inner, id, expected_gen, outcome).await
    }

    /// Commit a finished poll: registry timestamps, fleet counters, outward
    /// events, and the `active → error` demotion
    ///
    /// Liveness is re-checked first; results of polls whose source was
    /// removed or superseded in the interim are discarded wholesale.
    async fn commit_outcome(
        inner: &Arc<Inner>,
        id: &str,
        expected_gen: Option<u64>,
        outcome: PollOutcome,
    ) -> bool {
        let mut sources = inner.sources.write().await;
        let demoted = {
            let Some(entry) = sources.get_mut(id) else {
                tracing::debug!(source = id, "source removed mid-poll, result discarded");
                return false;
            };
            if let Some(generation) = expected_gen {
                if entry.generation != generation {
                    tracing::debug!(source = id, "source superseded mid-poll, result discarded");
                    return false;
                }
            }

            let now = Utc::now();
            let next = chrono::Duration::from_std(entry.pattern.period())
                .unwrap_or_else(|_| chrono::Duration::hours(1));
            {
                let mut source = entry.source.write().await;
                source.last_poll_at = Some(now);
                source.next_poll_at = Some(now + next);
            }

            {
                let mut counters = inner.counters.write().await;
                counters.total_polls += 1;
                if outcome.is_success() {
                    counters.successful_polls += 1;
                    counters.items_ingested += outcome.valid_items as u64;
                } else {
                    counters.failed_polls += 1;
                }
            }

            if outcome.is_success() {
                if !outcome.items.is_empty() {
                    let source_name = entry.source.read().await.name.clone();
                    inner.events.publish(SignalEvent::ItemsIngested {
                        source_id: id.to_string(),
                        metadata: IngestMetadata {
                            poll_id: outcome.poll_id.clone(),
                            source_name,
                            discovered_at: now,
                        },
                        items: outcome.items,
                    });
                }
                false
            } else {
                let max_retries = entry.source.read().await.polling.max_retries;
                let streak = entry.harness.consecutive_errors();
                if streak >= max_retries {
                    {
                        let mut source = entry.source.write().await;
                        source.status = SourceStatus::Error;
                    }
                    // halt the schedule; the retry loop is the only path back
                    if let Some(job) = entry.job.take() {
                        if expected_gen.is_none() {
                            // manual poll: the recurring job is someone else
                            job.abort();
                        }
                        // otherwise the job is this task; dropping the handle
                        // detaches it and the returned false ends the loop
                    }
                    let error = outcome
                        .failure
                        .map(|f| f.message)
                        .unwrap_or_else(|| "unknown error".to_string());
                    tracing::warn!(
                        source = id,
                        consecutive_errors = streak,
                        max_retries,
                        "source demoted to error: {error}"
                    );
                    inner.events.publish(SignalEvent::SourceFailed {
                        source_id: id.to_string(),
                        error,
                    });
                    true
                } else {
                    false
                }
            }
        };

        if demoted {
            Self::refresh_gauges(&sources).await;
            return false;
        }
        true
    }

    /// Spawn one source's recurring job: fires immediately, then every tick
    fn spawn_job(
        inner: &Arc<Inner>,
        id: String,
        generation: u64,
        pattern: SchedulePattern,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(pattern.period());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                if !Self::poll_source_inner(&inner, &id, Some(generation)).await {
                    break;
                }
            }
        })
    }

    /// Spawn the health monitor and failed-source retry loops
    fn spawn_monitors(&self) {
        let health_period =
            std::time::Duration::from_secs(self.inner.config.scheduler.health_check_interval_secs);
        let retry_period = std::time::Duration::from_secs(
            self.inner.config.scheduler.retry_failed_interval_secs,
        );

        let weak = Arc::downgrade(&self.inner);
        let health = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(health_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                health::health_cycle(&inner).await;
            }
        });

        let weak = Arc::downgrade(&self.inner);
        let retry = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(retry_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the immediate first tick would resurrect nothing useful
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                retry::retry_cycle(&inner).await;
            }
        });

        let mut monitors = self.inner.monitors.lock().expect("monitors lock");
        monitors.push(health);
        monitors.push(retry);
    }

    // ------------------------------------------------------------------
    // Read APIs
    // ------------------------------------------------------------------

    /// Fleet counters plus derived rates
    pub async fn get_stats(&self) -> SchedulerStats {
        let counters = *self.inner.counters.read().await;
        let sources = self.inner.sources.read().await;

        let mut active = 0;
        let mut inactive = 0;
        let mut failed = 0;
        for entry in sources.values() {
            match entry.source.read().await.status {
                SourceStatus::Active => active += 1,
                SourceStatus::Inactive => inactive += 1,
                SourceStatus::Error => failed += 1,
            }
        }

        let success_rate = if counters.total_polls == 0 {
            0.0
        } else {
            counters.successful_polls as f64 / counters.total_polls as f64
        };
        let avg_items_per_poll = if counters.total_polls == 0 {
            0.0
        } else {
            counters.items_ingested as f64 / counters.total_polls as f64
        };

        SchedulerStats {
            is_running: self.is_running(),
            total_sources: sources.len(),
            active_sources: active,
            inactive_sources: inactive,
            failed_sources: failed,
            total_polls: counters.total_polls,
            successful_polls: counters.successful_polls,
            failed_polls: counters.failed_polls,
            items_ingested: counters.items_ingested,
            success_rate,
            avg_items_per_poll,
        }
    }

    /// Per-source status rows
    pub async fn get_source_statuses(&self) -> Vec<SourceStatusReport> {
        let sources = self.inner.sources.read().await;
        let now = Utc::now();
        let mut reports = Vec::with_capacity(sources.len());
        for (id, entry) in sources.iter() {
            let source = entry.source.read().await;
            let state = entry.harness.state();
            reports.push(SourceStatusReport {
                id: id.clone(),
                name: source.name.clone(),
                status: source.status,
                schedule: entry.pattern.to_string(),
                health_score: health::health_score(&state, now),
                last_poll: source.last_poll_at,
                next_poll: source.next_poll_at,
                consecutive_errors: state.consecutive_errors,
                is_polling: state.is_polling,
            });
        }
        reports.sort_by(|a, b| a.id.cmp(&b.id));
        reports
    }

    /// Current status of one source, if registered
    pub async fn source_status(&self, id: &str) -> Option<SourceStatus> {
        let sources = self.inner.sources.read().await;
        let entry = sources.get(id)?;
        let status = entry.source.read().await.status;
        Some(status)
    }

    /// Recompute the fleet gauges from the registry
    async fn refresh_gauges(sources: &HashMap<String, SourceEntry>) {
        let mut active = 0usize;
        let mut failed = 0usize;
        for entry in sources.values() {
            match entry.source.read().await.status {
                SourceStatus::Active => active += 1,
                SourceStatus::Error => failed += 1,
                SourceStatus::Inactive => {}
            }
        }
        metrics::update_fleet_gauges(active, failed);
    }
}
