//! Failed-source retry loop
//!
//! The only path returning a source from `error` to `active`. On each pass
//! every source in `error` status gets its status reset, its adapter's
//! error state cleared (streak counter and backoff window — resurrection
//! wins over any remaining backoff), and a fresh schedule. Best-effort: a
//! resurrected source that keeps failing re-enters `error` through the
//! normal demotion path.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::{Inner, SignalScheduler};
use crate::models::SourceStatus;

impl SignalScheduler {
    /// Run one retry pass now; returns how many sources were resurrected
    pub async fn run_retry_cycle(&self) -> usize {
        retry_cycle(&self.inner).await
    }
}

/// One pass of the failed-source retry loop
pub(super) async fn retry_cycle(inner: &Arc<Inner>) -> usize {
    let running = inner.running.load(Ordering::SeqCst);
    let mut sources = inner.sources.write().await;

    let mut retried = 0usize;
    // collect first: spawning inside the iteration would borrow the map twice
    let failed_ids: Vec<String> = {
        let mut ids = Vec::new();
        for (id, entry) in sources.iter() {
            if entry.source.read().await.status == SourceStatus::Error {
                ids.push(id.clone());
            }
        }
        ids
    };

    for id in failed_ids {
        let Some(entry) = sources.get_mut(&id) else {
            continue;
        };

        {
            let mut source = entry.source.write().await;
            source.status = SourceStatus::Active;
        }
        entry.harness.reset_error_state();

        if let Some(job) = entry.job.take() {
            job.abort();
        }
        let generation = inner.next_generation.fetch_add(1, Ordering::SeqCst);
        entry.generation = generation;
        if running {
            entry.job = Some(SignalScheduler::spawn_job(
                inner,
                id.clone(),
                generation,
                entry.pattern,
            ));
        }

        tracing::info!(source = %id, "failed source reset to active and rescheduled");
        retried += 1;
    }

    if retried > 0 {
        SignalScheduler::refresh_gauges(&sources).await;
    }
    retried
}
