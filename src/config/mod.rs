//! Configuration management for the siphon engine
//!
//! Engine settings load from an optional TOML file with environment
//! variable overrides (`SIPHON_*`); the source fleet is declared in a
//! separate TOML manifest of `[[sources]]` tables matching the registry
//! data model.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::Source;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// HTTP configuration (outbound client identity, status server)
    #[serde(default)]
    pub http: HttpSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Maximum simultaneously in-flight polls across the fleet
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    /// Seconds between health monitoring passes
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Seconds between failed-source retry passes
    #[serde(default = "default_retry_failed_interval")]
    pub retry_failed_interval_secs: u64,

    /// Notification channel buffer per subscriber
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_concurrent_sources() -> usize {
    10
}
fn default_health_check_interval() -> u64 {
    60
}
fn default_retry_failed_interval() -> u64 {
    900
}
fn default_event_buffer() -> usize {
    256
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_sources: default_max_concurrent_sources(),
            health_check_interval_secs: default_health_check_interval(),
            retry_failed_interval_secs: default_retry_failed_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Fixed identifying user-agent sent on every fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Bind address for the status server
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Whether to expose the status server at all
    #[serde(default = "default_enable_status_server")]
    pub enable_status_server: bool,
}

fn default_user_agent() -> String {
    format!("siphon/{}", env!("CARGO_PKG_VERSION"))
}
fn default_bind_addr() -> String {
    "127.0.0.1:9100".to_string()
}
fn default_enable_status_server() -> bool {
    true
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            bind_addr: default_bind_addr(),
            enable_status_server: default_enable_status_server(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SIPHON_*` environment variable overrides
    pub fn apply_env(mut self) -> Self {
        if let Some(v) = env_parse("SIPHON_MAX_CONCURRENT_SOURCES") {
            self.scheduler.max_concurrent_sources = v;
        }
        if let Some(v) = env_parse("SIPHON_HEALTH_CHECK_INTERVAL") {
            self.scheduler.health_check_interval_secs = v;
        }
        if let Some(v) = env_parse("SIPHON_RETRY_FAILED_INTERVAL") {
            self.scheduler.retry_failed_interval_secs = v;
        }
        if let Some(v) = env_parse("SIPHON_EVENT_BUFFER") {
            self.scheduler.event_buffer = v;
        }
        if let Ok(v) = std::env::var("SIPHON_USER_AGENT") {
            self.http.user_agent = v;
        }
        if let Ok(v) = std::env::var("SIPHON_BIND_ADDR") {
            self.http.bind_addr = v;
        }
        if let Some(v) = env_parse::<bool>("SIPHON_STATUS_SERVER") {
            self.http.enable_status_server = v;
        }
        if let Ok(v) = std::env::var("SIPHON_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("SIPHON_LOG_FORMAT") {
            self.logging.format = v;
        }
        self
    }

    /// Load: file if given, defaults otherwise, env overrides on top
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_concurrent_sources == 0 {
            anyhow::bail!("scheduler.max_concurrent_sources must be at least 1");
        }
        if self.scheduler.health_check_interval_secs == 0 {
            anyhow::bail!("scheduler.health_check_interval_secs must be at least 1");
        }
        if self.scheduler.retry_failed_interval_secs == 0 {
            anyhow::bail!("scheduler.retry_failed_interval_secs must be at least 1");
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            );
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Declarative source fleet, loaded from a TOML manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceManifest {
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl SourceManifest {
    /// Load and validate a `[[sources]]` manifest
    ///
    /// Every entry must pass registration validation; the first violation
    /// rejects the whole manifest so a typo cannot silently drop a source.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading source manifest {}", path.display()))?;
        let manifest: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing source manifest {}", path.display()))?;
        for source in &manifest.sources {
            source
                .validate()
                .with_context(|| format!("invalid source '{}'", source.id))?;
        }
        Ok(manifest)
    }
}
