//! Throttle configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Consecutive failures allowed before an account locks.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How long a lockout lasts, in seconds.
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 60;

/// Longest lockout accepted by [`ThrottleConfig::validate`]: one year.
pub const MAX_LOCKOUT_SECONDS: i64 = 365 * 24 * 60 * 60;

/// What the engine does when the ledger cannot be read.
///
/// Writes always fail closed regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Surface the storage error to the caller.
    #[default]
    FailClosed,
    /// Treat the account as open with a full attempt budget. Weakens the
    /// throttle while the ledger is down.
    FailOpen,
}

/// Configuration for the throttle engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Failures that trigger a lockout
    pub max_attempts: u32,
    /// Lockout length
    #[serde(with = "duration_seconds")]
    pub lockout_duration: Duration,
    #[serde(default)]
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: Duration::seconds(DEFAULT_LOCKOUT_SECONDS),
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

impl ThrottleConfig {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            max_attempts,
            lockout_duration,
            ..Default::default()
        }
    }

    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.lockout_duration <= Duration::zero() {
            return Err(ValidationError::InvalidConfig(
                "lockout_duration must be positive".to_string(),
            ));
        }

        if self.lockout_duration > Duration::seconds(MAX_LOCKOUT_SECONDS) {
            return Err(ValidationError::InvalidConfig(format!(
                "lockout_duration must be at most {MAX_LOCKOUT_SECONDS} seconds"
            )));
        }

        Ok(())
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs)
            .ok_or_else(|| D::Error::custom(format!("lockout_duration out of range: {secs}")))
    }
}
