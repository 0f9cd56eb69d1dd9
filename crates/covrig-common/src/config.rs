//! Harness configuration model.
//!
//! Values come from [`HarnessConfig::default`], optionally a JSON file,
//! then `COVRIG_*` environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{CovrigError, Result};

/// Root configuration for launching, probing, and stopping containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Container runtime CLI (`docker`, `podman`, or an absolute path).
    pub runtime: String,
    /// Seconds a stop request waits for a clean exit before SIGKILL.
    pub grace_period_secs: u64,
    /// Seconds the readiness waiter polls before failing.
    pub ready_timeout_secs: u64,
    /// Milliseconds between polls.
    pub poll_interval_ms: u64,
    /// Whether containers are removed after they are stopped.
    pub remove_on_stop: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            runtime: constants::DEFAULT_RUNTIME_BINARY.to_string(),
            grace_period_secs: constants::DEFAULT_GRACE_PERIOD_SECS,
            ready_timeout_secs: constants::DEFAULT_READY_TIMEOUT_SECS,
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            remove_on_stop: true,
        }
    }
}

impl HarnessConfig {
    /// Loads a configuration file, filling missing fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CovrigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `COVRIG_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is not a valid number or the result
    /// fails validation.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is not a valid number or the result
    /// fails validation.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(runtime) = lookup(constants::ENV_RUNTIME).filter(|v| !v.is_empty()) {
            self.runtime = runtime;
        }
        if let Some(v) = lookup(constants::ENV_GRACE_PERIOD_SECS) {
            self.grace_period_secs = parse_number(constants::ENV_GRACE_PERIOD_SECS, &v)?;
        }
        if let Some(v) = lookup(constants::ENV_READY_TIMEOUT_SECS) {
            self.ready_timeout_secs = parse_number(constants::ENV_READY_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = lookup(constants::ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_number(constants::ENV_POLL_INTERVAL_MS, &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks the invariants the waiter and stopper rely on.
    ///
    /// A zero grace period is allowed and means an abrupt stop.
    ///
    /// # Errors
    ///
    /// Returns `CovrigError::Config` if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.trim().is_empty() {
            return Err(CovrigError::Config {
                message: "runtime must not be empty".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(CovrigError::Config {
                message: "poll_interval_ms must be greater than zero".into(),
            });
        }
        if self.ready_timeout_secs == 0 {
            return Err(CovrigError::Config {
                message: "ready_timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Grace period as a [`Duration`].
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Readiness timeout as a [`Duration`].
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| CovrigError::Config {
        message: format!("{key} must be a non-negative integer, got `{value}`"),
    })
}
