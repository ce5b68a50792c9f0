//! Lifecycle configuration.

use crate::errors::ConfigError;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding [`LifecycleConfig::pending_time_limit_ms`].
pub const ENV_PENDING_TIME_LIMIT_MS: &str = "UPDATEFLOW_PENDING_TIME_LIMIT_MS";
/// Environment variable overriding [`LifecycleConfig::sweep_interval_ms`].
pub const ENV_SWEEP_INTERVAL_MS: &str = "UPDATEFLOW_SWEEP_INTERVAL_MS";
/// Environment variable overriding [`LifecycleConfig::reclaim_on_add`].
pub const ENV_RECLAIM_ON_ADD: &str = "UPDATEFLOW_RECLAIM_ON_ADD";

/// Configuration for the update context lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Maximum age of a context in milliseconds. Zero or negative means
    /// every context is immediately stale.
    #[serde(default = "default_pending_time_limit_ms")]
    pub pending_time_limit_ms: i64,
    /// How often the background sweeper reclaims stale contexts.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Whether to reclaim stale contexts each time a context is created.
    #[serde(default)]
    pub reclaim_on_add: bool,
}

fn default_pending_time_limit_ms() -> i64 {
    5 * 60 * 1000
}

fn default_sweep_interval_ms() -> u64 {
    10 * 1000
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            pending_time_limit_ms: default_pending_time_limit_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            reclaim_on_add: false,
        }
    }
}

impl LifecycleConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Builds a configuration from defaults overridden by environment
    /// variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from defaults overridden by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_PENDING_TIME_LIMIT_MS) {
            config.pending_time_limit_ms = parse_env(ENV_PENDING_TIME_LIMIT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_SWEEP_INTERVAL_MS) {
            config.sweep_interval_ms = parse_env(ENV_SWEEP_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_RECLAIM_ON_ADD) {
            config.reclaim_on_add = parse_env(ENV_RECLAIM_ON_ADD, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the pending time limit.
    #[must_use]
    pub fn with_pending_time_limit(mut self, limit: TimeDelta) -> Self {
        self.pending_time_limit_ms = limit.num_milliseconds();
        self
    }

    /// Sets the sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enables or disables reclamation on every new context.
    #[must_use]
    pub const fn with_reclaim_on_add(mut self, enabled: bool) -> Self {
        self.reclaim_on_add = enabled;
        self
    }

    /// Gets the pending time limit.
    ///
    /// Values below the representable range clamp to [`TimeDelta::MIN`],
    /// which still means "always exceeded".
    #[must_use]
    pub fn pending_time_limit(&self) -> TimeDelta {
        TimeDelta::try_milliseconds(self.pending_time_limit_ms).unwrap_or(TimeDelta::MIN)
    }

    /// Gets the sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Checks the configuration for unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::invalid_field(
                "sweep_interval_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}
