//! Unified error handling for the siphon crate
//!
//! Domain-specific errors (`RegistrationError`, `FetchError`, `SchedulerError`)
//! are consolidated into a single [`Error`] enum, while staying usable on
//! their own at the module boundaries where they originate.
//!
//! The taxonomy mirrors how failures are handled:
//!
//! - registration errors are fatal and synchronous — they reject the call
//! - transport and payload errors are recoverable and feed the per-adapter
//!   consecutive-error streak
//! - scheduler errors cover lifecycle misuse (unknown source, invalid
//!   status transition) and are synchronous as well

use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, connection)
    Network,
    /// Payload shape and decoding errors
    Payload,
    /// Registration and configuration errors
    Config,
    /// Scheduler lifecycle errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Payload => "payload",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

/// Errors raised synchronously by `add_source` / `update_source`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// A required field is empty or missing
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The source URL does not parse
    #[error("invalid source url '{0}'")]
    InvalidUrl(String),

    /// `interval_minutes` outside the accepted [5, 1440] range
    #[error("interval_minutes {0} outside accepted range 5..=1440")]
    IntervalOutOfRange(u32),

    /// No adapter exists for this source type
    #[error("unsupported source type '{0}'")]
    UnsupportedType(String),

    /// `trust_score` outside [0, 1]
    #[error("trust_score {0} outside accepted range 0.0..=1.0")]
    InvalidTrustScore(f64),

    /// `active_hours` did not parse as HH:MM
    #[error("invalid active_hours value '{0}', expected HH:MM")]
    InvalidActiveHours(String),

    /// A source with this id is already registered
    #[error("source '{0}' is already registered")]
    DuplicateSource(String),

    /// Catch-all for field-level validation failures
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors raised by one fetch attempt inside a poll
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request exceeded the configured `timeout_seconds`
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure before any response
    #[error("connection failed: {0}")]
    Connect(String),

    /// Non-2xx HTTP response
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// Response body could not be decoded to text
    #[error("decode error: {0}")]
    Decode(String),

    /// Payload was fetched but is not a recognizable feed shape
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Any other transport-level failure
    #[error("transport error: {0}")]
    Other(String),
}

impl FetchError {
    /// Classify a reqwest error into the fetch taxonomy
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Other(err.to_string())
        }
    }

    /// Stable classification string carried on `poll_error` events
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect(_) => "connect",
            Self::Status(_) => "http_status",
            Self::Decode(_) => "decode",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Other(_) => "other",
        }
    }

    /// HTTP status code, when the failure carries one
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(err)
    }
}

/// Errors raised by scheduler lifecycle operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// Operation referenced a source id that is not registered
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    /// `start` called while already running
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// A status transition outside the allowed state machine
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },
}

/// Unified error type for the siphon crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Registration(_) => ErrorCategory::Config,
            Self::Fetch(e) => match e {
                FetchError::Decode(_) | FetchError::InvalidPayload(_) => ErrorCategory::Payload,
                _ => ErrorCategory::Network,
            },
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Config(_) => ErrorCategory::Config,
            Self::Io(_) => ErrorCategory::Other,
        }
    }

    /// Check if this error is recoverable (can be retried)
    ///
    /// Transport and payload errors feed the retry machinery; registration,
    /// configuration and lifecycle errors are final for the call that
    /// produced them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Payload
        )
    }
}

/// Convenience result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
