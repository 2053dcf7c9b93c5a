//! Attempt ledger data model and throttle read-outs.
//!
//! [`AttemptRecord`] is the per-account row the ledger stores. The pure state
//! transitions live here as methods taking an explicit `now`, so the engine
//! only has to sequence load → transition → conditional save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, config::ThrottleConfig, error::ThrottleError};

/// One account's throttle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub account_id: AccountId,
    /// Failures since the last success or lockout clear
    pub failure_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Concurrency token. `0` means the record has never been stored; the
    /// ledger bumps it on every successful save.
    pub version: i64,
}

/// Derived lockout state of a record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleState {
    Open,
    Locked,
    /// `locked_until` has passed but nobody has cleared it yet.
    Expired,
}

impl AttemptRecord {
    /// A record for an account the ledger has never seen.
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            failure_count: 0,
            locked_until: None,
            last_failure_at: None,
            version: 0,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> ThrottleState {
        match self.locked_until {
            Some(until) if now < until => ThrottleState::Locked,
            Some(_) => ThrottleState::Expired,
            None => ThrottleState::Open,
        }
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == ThrottleState::Locked
    }

    /// Clear an expired lockout and its counter. Returns `true` if anything
    /// changed, i.e. the record needs to be written back.
    pub fn clear_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.state_at(now) != ThrottleState::Expired {
            return false;
        }
        self.failure_count = 0;
        self.locked_until = None;
        true
    }

    /// Count one failure against an open record, locking it when the
    /// threshold is reached. Callers must have cleared expiry first and must
    /// not call this on a locked record. A lockout past the end of the
    /// representable calendar saturates.
    pub fn register_failure(&mut self, now: DateTime<Utc>, config: &ThrottleConfig) {
        debug_assert!(!self.is_locked_at(now));
        self.failure_count = (self.failure_count + 1).min(config.max_attempts);
        self.last_failure_at = Some(now);
        if self.failure_count >= config.max_attempts {
            let until = now
                .checked_add_signed(config.lockout_duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.locked_until = Some(until);
        }
    }

    /// Forget all failures.
    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.locked_until = None;
    }

    /// Seconds until the lockout lifts, rounded up; zero when not locked.
    pub fn seconds_remaining_at(&self, now: DateTime<Utc>) -> u64 {
        match self.locked_until {
            Some(until) if now < until => {
                let millis = (until - now).num_milliseconds();
                u64::try_from((millis + 999) / 1000).unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn decision_at(&self, now: DateTime<Utc>, config: &ThrottleConfig) -> Decision {
        if self.is_locked_at(now) {
            Decision {
                allowed: false,
                attempts_left: 0,
                seconds_remaining: self.seconds_remaining_at(now),
            }
        } else {
            Decision {
                allowed: true,
                attempts_left: config.max_attempts.saturating_sub(self.failure_count),
                seconds_remaining: 0,
            }
        }
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>, config: &ThrottleConfig) -> Snapshot {
        let decision = self.decision_at(now, config);
        Snapshot {
            exists: self.is_persisted(),
            is_locked: !decision.allowed,
            seconds_remaining: decision.seconds_remaining,
            failure_count: self.failure_count,
            attempts_left: decision.attempts_left,
            last_failure_at: self.last_failure_at,
        }
    }
}

/// Whether a login attempt may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub attempts_left: u32,
    pub seconds_remaining: u64,
}

impl Decision {
    pub fn is_locked(&self) -> bool {
        !self.allowed
    }

    /// Turn a rejected decision into [`ThrottleError::Locked`].
    pub fn ensure_allowed(self) -> Result<Self, ThrottleError> {
        if self.allowed {
            Ok(self)
        } else {
            Err(ThrottleError::Locked {
                seconds_remaining: self.seconds_remaining,
            })
        }
    }
}

/// Read-only projection of an account's throttle state for UI polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Whether the ledger holds a record for this account at all
    pub exists: bool,
    pub is_locked: bool,
    pub seconds_remaining: u64,
    pub failure_count: u32,
    pub attempts_left: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}
