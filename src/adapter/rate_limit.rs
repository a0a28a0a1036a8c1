//! Sliding one-minute request window
//!
//! Each adapter instance owns one [`RateWindow`]. A caller that finds the
//! window full suspends until the window's remaining time elapses, then the
//! window resets and the caller is admitted. Requests are delayed, never
//! dropped, and only the suspended poll waits — other adapters' windows are
//! independent.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Length of one request-count window
pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct WindowState {
    started: Instant,
    count: u32,
}

/// Per-adapter sliding-window rate gate
#[derive(Debug)]
pub struct RateWindow {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RateWindow {
    /// Gate admitting `limit` requests per minute (minimum 1)
    pub fn per_minute(limit: u32) -> Self {
        Self::with_window(limit, WINDOW)
    }

    fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            state: Mutex::new(WindowState {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Admit one request, suspending until the window boundary if full
    pub async fn acquire(&self) {
        self.acquire_with_limit(self.limit).await;
    }

    /// Admit one request against a caller-supplied limit
    ///
    /// Used when the limit can change between polls (configuration
    /// updates); the window state itself persists across limit changes.
    pub async fn acquire_with_limit(&self, limit: u32) {
        let limit = limit.max(1);
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.started);

                if elapsed >= self.window {
                    state.started = now;
                    state.count = 0;
                }

                if state.count < limit {
                    state.count += 1;
                    return;
                }

                self.window - elapsed
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate window full, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests admitted in the current window
    pub async fn current_count(&self) -> u32 {
        let state = self.state.lock().await;
        if state.started.elapsed() >= self.window {
            0
        } else {
            state.count
        }
    }
}
