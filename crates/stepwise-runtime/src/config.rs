//! Step runtime configuration.
//!
//! # Environment Variables
//!
//! - `STEPWISE_POLL_INTERVAL_MS`: Interval between polls for polling families
//! - `STEPWISE_STEP_TIMEOUT_MS`: Default wait for `next`/`stepIn`/`stepOut`
//! - `STEPWISE_CONTINUE_TIMEOUT_MS`: Default wait for `continue`
//! - `STEPWISE_MAX_TIMEOUT_MS`: Largest timeout a caller may request
//!
//! `StepConfig::from_env` loads `.env.local` first when it exists.

use std::time::Duration;

use tracing::warn;

use stepwise_models::{StepCommand, DEFAULT_CONTINUE_TIMEOUT, DEFAULT_STEP_TIMEOUT};

use crate::error::{Result, StepError};

/// Environment variable for the poll interval.
pub const POLL_INTERVAL_ENV: &str = "STEPWISE_POLL_INTERVAL_MS";

/// Environment variable for the single-step default timeout.
pub const STEP_TIMEOUT_ENV: &str = "STEPWISE_STEP_TIMEOUT_MS";

/// Environment variable for the continue default timeout.
pub const CONTINUE_TIMEOUT_ENV: &str = "STEPWISE_CONTINUE_TIMEOUT_MS";

/// Environment variable for the largest accepted timeout.
pub const MAX_TIMEOUT_ENV: &str = "STEPWISE_MAX_TIMEOUT_MS";

/// Smallest accepted timeout.
pub const MIN_TIMEOUT_MS: u64 = 1;

/// Largest accepted timeout unless configured otherwise.
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 300_000;

/// Configuration for the step runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    /// How often the polling strategy inspects the debuggee.
    pub poll_interval: Duration,
    /// Default wait for single-step commands.
    pub step_timeout: Duration,
    /// Default wait for `continue`.
    pub continue_timeout: Duration,
    /// Largest timeout a caller may request.
    pub max_timeout: Duration,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            step_timeout: DEFAULT_STEP_TIMEOUT,
            continue_timeout: DEFAULT_CONTINUE_TIMEOUT,
            max_timeout: Duration::from_millis(DEFAULT_MAX_TIMEOUT_MS),
        }
    }
}

impl StepConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment (and `.env.local`).
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    ///
    /// Unparseable or zero values are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| -> Option<Duration> {
            let raw = lookup(key)?;
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => {
                    warn!(key, value = %raw, "ignoring invalid duration");
                    None
                }
            }
        };

        let defaults = Self::default();
        Self {
            poll_interval: read(POLL_INTERVAL_ENV).unwrap_or(defaults.poll_interval),
            step_timeout: read(STEP_TIMEOUT_ENV).unwrap_or(defaults.step_timeout),
            continue_timeout: read(CONTINUE_TIMEOUT_ENV).unwrap_or(defaults.continue_timeout),
            max_timeout: read(MAX_TIMEOUT_ENV).unwrap_or(defaults.max_timeout),
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the default single-step timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Sets the default continue timeout.
    pub fn with_continue_timeout(mut self, timeout: Duration) -> Self {
        self.continue_timeout = timeout;
        self
    }

    /// Sets the largest accepted timeout.
    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout = timeout;
        self
    }

    /// Default wait for a command.
    pub fn default_timeout(&self, command: StepCommand) -> Duration {
        if command.is_resume() {
            self.continue_timeout
        } else {
            self.step_timeout
        }
    }

    /// Validates a caller-supplied timeout, falling back to the command
    /// default when absent.
    pub fn resolve_timeout(
        &self,
        command: StepCommand,
        timeout_ms: Option<u64>,
    ) -> Result<Duration> {
        let Some(ms) = timeout_ms else {
            return Ok(self.default_timeout(command));
        };

        let max = self.max_timeout.as_millis() as u64;
        if !(MIN_TIMEOUT_MS..=max).contains(&ms) {
            return Err(StepError::InvalidParams(format!(
                "timeoutMs must be between {} and {}, got {}",
                MIN_TIMEOUT_MS, max, ms
            )));
        }

        Ok(Duration::from_millis(ms))
    }
}
