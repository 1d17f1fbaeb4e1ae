//! Daemon configuration.
//!
//! All reconciliation tunables live here: retry budget, backoff
//! shape, and the stats audit cadence. Values come from an optional
//! YAML file, with individual command-line overrides on top.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::DaemonError;

/// Retry policy for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per flow-mod before the rule is marked failed.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds; doubles per attempt.
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff delay.
    pub backoff_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 200,
            backoff_cap_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Backoff delay before retrying after `attempt` failures
    /// (1-based), exponential with a cap. Jitter is added by the
    /// caller so tests can stay deterministic.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.backoff_cap_ms);
        Duration::from_millis(ms)
    }
}

/// Reconciliation engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    /// Seconds between periodic stats audits, 0 disables the timer.
    pub audit_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            audit_interval_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Audit interval, `None` when the timer is disabled.
    pub fn audit_interval(&self) -> Option<Duration> {
        (self.audit_interval_secs > 0).then(|| Duration::from_secs(self.audit_interval_secs))
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub engine: EngineConfig,
}

impl DaemonConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, DaemonError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DaemonError::Config(format!("{}: {}", path.display(), e)))?;
        let config = serde_yaml::from_str(&raw)?;
        Ok(config)
    }
}
