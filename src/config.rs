//! Timing and retry configuration.
//!
//! Every knob has a default, may be overridden through a `STACKPILOT_*`
//! environment variable, and is finally overridden by the matching command
//! line flag. Environment values are clamped to a sane maximum rather than
//! rejected.

use crate::stack::{DeployPolicy, TeardownPolicy};
use std::time::Duration;

/// Upper bound for `max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 20;
/// Upper bound for any delay or interval, in seconds
pub const MAX_INTERVAL_SECS: u64 = 600;
/// Upper bound for the teardown budget, in seconds (4 hours)
pub const MAX_TEARDOWN_TIMEOUT_SECS: u64 = 4 * 60 * 60;

/// Timing configuration shared by every command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationConfig {
    /// Deploy retries after the first attempt
    pub max_retries: u32,
    /// Sleep between deploy attempts
    pub retry_delay: Duration,
    /// Sleep between teardown status checks
    pub poll_interval: Duration,
    /// Total teardown budget per stack
    pub teardown_timeout: Duration,
    /// Timeout applied to each single `aws` invocation
    pub aws_call_timeout: Duration,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(30),
            poll_interval: Duration::from_secs(15),
            teardown_timeout: Duration::from_secs(1800),
            // Long enough for `cloudformation deploy`, which waits for the changeset
            aws_call_timeout: Duration::from_secs(3600),
        }
    }
}

impl OperationConfig {
    /// Parse a number from an environment variable, clamped to `max`.
    ///
    /// Unset or unparsable values fall back to `default`.
    fn parse_env_clamped<T>(var_name: &str, default: T, max: T) -> T
    where
        T: std::str::FromStr + Ord,
    {
        std::env::var(var_name)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .map(|v| v.min(max))
            .unwrap_or(default)
    }

    fn secs_from_env(var_name: &str, default: Duration, max_secs: u64) -> Duration {
        Duration::from_secs(Self::parse_env_clamped(var_name, default.as_secs(), max_secs))
    }

    /// Create config from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: Self::parse_env_clamped(
                "STACKPILOT_MAX_RETRIES",
                defaults.max_retries,
                MAX_RETRIES_LIMIT,
            ),
            retry_delay: Self::secs_from_env(
                "STACKPILOT_RETRY_DELAY_SECS",
                defaults.retry_delay,
                MAX_INTERVAL_SECS,
            ),
            poll_interval: Self::secs_from_env(
                "STACKPILOT_POLL_INTERVAL_SECS",
                defaults.poll_interval,
                MAX_INTERVAL_SECS,
            ),
            teardown_timeout: Self::secs_from_env(
                "STACKPILOT_TEARDOWN_TIMEOUT_SECS",
                defaults.teardown_timeout,
                MAX_TEARDOWN_TIMEOUT_SECS,
            ),
            aws_call_timeout: Self::secs_from_env(
                "STACKPILOT_AWS_CALL_TIMEOUT_SECS",
                defaults.aws_call_timeout,
                MAX_TEARDOWN_TIMEOUT_SECS,
            ),
        }
    }

    /// Validate values that came from flags rather than the environment
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(format!(
                "max_retries too high: {} (max: {MAX_RETRIES_LIMIT})",
                self.max_retries
            ));
        }
        if self.retry_delay.as_secs() > MAX_INTERVAL_SECS {
            return Err(format!(
                "retry_delay too long: {}s (max: {MAX_INTERVAL_SECS}s)",
                self.retry_delay.as_secs()
            ));
        }
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be at least 1s".to_string());
        }
        if self.poll_interval.as_secs() > MAX_INTERVAL_SECS {
            return Err(format!(
                "poll_interval too long: {}s (max: {MAX_INTERVAL_SECS}s)",
                self.poll_interval.as_secs()
            ));
        }
        if self.teardown_timeout.is_zero() {
            return Err("teardown timeout must be at least 1s".to_string());
        }
        if self.teardown_timeout.as_secs() > MAX_TEARDOWN_TIMEOUT_SECS {
            return Err(format!(
                "teardown timeout too long: {}s (max: {MAX_TEARDOWN_TIMEOUT_SECS}s)",
                self.teardown_timeout.as_secs()
            ));
        }
        if self.aws_call_timeout.is_zero() {
            return Err("aws call timeout must be at least 1s".to_string());
        }
        Ok(())
    }

    /// Deploy retry policy
    pub fn deploy_policy(&self) -> DeployPolicy {
        DeployPolicy {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        }
    }

    /// Teardown polling policy
    pub fn teardown_policy(&self) -> TeardownPolicy {
        TeardownPolicy {
            poll_interval: self.poll_interval,
            timeout: self.teardown_timeout,
        }
    }
}
