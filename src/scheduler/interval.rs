//! Interval → recurring-schedule conversion
//!
//! A source declares "every N minutes"; the scheduler turns that into a
//! recurring pattern. Minute-aligned intervals that divide the hour evenly
//! become every-N-minutes patterns; hour-aligned intervals that divide the
//! day evenly become every-N-hours patterns; anything fitting neither rule
//! falls back to hourly as a safe default. The conversion is deterministic.

use std::time::Duration;

/// Recurring cadence for one source's polling job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulePattern {
    /// Fires every N minutes; N divides 60
    EveryMinutes(u32),
    /// Fires every N hours; N divides 24
    EveryHours(u32),
}

impl SchedulePattern {
    /// Convert a polling interval in minutes into a recurring pattern
    pub fn from_interval_minutes(interval: u32) -> Self {
        if interval == 0 {
            return Self::EveryHours(1);
        }
        if interval < 60 && 60 % interval == 0 {
            return Self::EveryMinutes(interval);
        }
        if interval % 60 == 0 {
            let hours = interval / 60;
            if 24 % hours == 0 {
                return Self::EveryHours(hours);
            }
        }
        // no clean minute/hour factorization
        Self::EveryHours(1)
    }

    /// Period between consecutive firings
    pub fn period(&self) -> Duration {
        match self {
            Self::EveryMinutes(n) => Duration::from_secs(u64::from(*n) * 60),
            Self::EveryHours(n) => Duration::from_secs(u64::from(*n) * 3600),
        }
    }
}

impl std::fmt::Display for SchedulePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EveryMinutes(n) => write!(f, "every {n} minutes"),
            Self::EveryHours(1) => write!(f, "hourly"),
            Self::EveryHours(n) => write!(f, "every {n} hours"),
        }
    }
}
