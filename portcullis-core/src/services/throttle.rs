//! Login throttling service with lazy lockout expiry.
//!
//! This module implements the per-account throttle state machine:
//!
//! - **Open**: fewer than `max_attempts` consecutive failures
//! - **Locked**: `locked_until` is in the future; attempts are rejected
//! - **Expired**: `locked_until` has passed; the next call that touches the
//!   account clears the lockout and resets the counter
//!
//! There is no background sweeper. A lockout "ends" when a later
//! [`evaluate`](ThrottleService::evaluate), [`status`](ThrottleService::status)
//! or [`record_failure`](ThrottleService::record_failure) observes that its
//! expiry has passed. Stale `locked_until` values stay in the ledger until the
//! account is touched again.
//!
//! # Concurrency
//!
//! Every operation on one account runs under that account's async mutex, so
//! load → transition → save never interleaves inside a process. The save
//! itself is a versioned compare-and-swap, which catches writers in other
//! processes sharing the ledger; a conflict is retried once against fresh
//! state and then surfaced as an error. Different accounts never share a lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis_core::{AccountId, ThrottleConfig, services::ThrottleService};
//!
//! let service = ThrottleService::new(ledger, ThrottleConfig::default());
//! let account = AccountId::parse("user@example.com")?;
//!
//! let decision = service.evaluate(&account).await?;
//! if decision.allowed {
//!     // verify credentials, then:
//!     service.record_failure(&account).await?;
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    AccountId, Error,
    clock::{Clock, SystemClock},
    config::{ReadFailurePolicy, ThrottleConfig},
    events::{Event, EventBus, UnlockReason},
    repositories::AttemptLedger,
    storage::{AttemptRecord, Decision, Snapshot},
};

/// Service that owns the attempt ledger and decides whether logins may proceed.
pub struct ThrottleService<R: AttemptLedger> {
    repository: Arc<R>,
    config: ThrottleConfig,
    clock: Arc<dyn Clock>,
    locks: AccountLocks,
    events: Option<EventBus>,
}

/// Result of one committed read-modify-write.
struct Applied {
    before: AttemptRecord,
    after: AttemptRecord,
    expired: bool,
    now: DateTime<Utc>,
}

impl<R: AttemptLedger> ThrottleService<R> {
    /// Create a new ThrottleService using the system clock.
    pub fn new(repository: Arc<R>, config: ThrottleConfig) -> Self {
        Self {
            repository,
            config,
            clock: Arc::new(SystemClock),
            locks: AccountLocks::default(),
            events: None,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish security events to `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Decide whether a login attempt for `account` may proceed.
    ///
    /// Clears an expired lockout as a side effect.
    pub async fn evaluate(&self, account: &AccountId) -> Result<Decision, Error> {
        let _guard = self.locks.lock(account).await;
        let now = self.clock.now();

        match self.observe(account, now).await {
            Ok(record) => Ok(record.decision_at(now, &self.config)),
            Err(e) => self
                .fail_open(account, e)
                .map(|record| record.decision_at(now, &self.config)),
        }
    }

    /// Read-only projection for UI polling.
    ///
    /// Like [`evaluate`](Self::evaluate), the only state change is clearing an
    /// expired lockout.
    pub async fn status(&self, account: &AccountId) -> Result<Snapshot, Error> {
        let _guard = self.locks.lock(account).await;
        let now = self.clock.now();

        match self.observe(account, now).await {
            Ok(record) => Ok(record.snapshot_at(now, &self.config)),
            Err(e) => self
                .fail_open(account, e)
                .map(|record| record.snapshot_at(now, &self.config)),
        }
    }

    /// Count a failed login.
    ///
    /// A failure submitted while the account is locked changes nothing: the
    /// counter stays put and the lockout is not extended. Otherwise the
    /// counter increments, and reaching `max_attempts` locks the account for
    /// `lockout_duration`. Returns the decision after the update.
    pub async fn record_failure(&self, account: &AccountId) -> Result<Decision, Error> {
        let _guard = self.locks.lock(account).await;
        let config = &self.config;

        let applied = self
            .apply(account, |record, now| {
                if !record.is_locked_at(now) {
                    record.register_failure(now, config);
                }
            })
            .await?;

        let Applied {
            before,
            after,
            expired,
            now,
        } = &applied;

        if *expired {
            self.emit_unlocked(account, UnlockReason::LockoutExpired, *now)
                .await;
        }

        if before.is_locked_at(*now) {
            tracing::debug!(
                account = %account,
                seconds_remaining = after.seconds_remaining_at(*now),
                "Ignoring failed attempt on locked account"
            );
        } else {
            tracing::debug!(
                account = %account,
                failure_count = after.failure_count,
                "Recorded failed login attempt"
            );
            self.emit(Event::LoginFailed {
                account: account.clone(),
                failure_count: after.failure_count,
                timestamp: *now,
            })
            .await;

            if let Some(locked_until) = after.locked_until {
                tracing::warn!(
                    account = %account,
                    failure_count = after.failure_count,
                    locked_until = %locked_until,
                    "Account locked after repeated login failures"
                );
                self.emit(Event::AccountLocked {
                    account: account.clone(),
                    failure_count: after.failure_count,
                    locked_until,
                    timestamp: *now,
                })
                .await;
            }
        }

        Ok(after.decision_at(*now, config))
    }

    /// Clear the counter and any lockout after a successful login.
    ///
    /// Callers must only use this after [`evaluate`](Self::evaluate) allowed
    /// the attempt. Idempotent.
    pub async fn record_success(&self, account: &AccountId) -> Result<(), Error> {
        self.clear(account, UnlockReason::Success).await?;
        Ok(())
    }

    /// Operator reset. Clears the account like a successful login and
    /// reports whether it was locked beforehand.
    pub async fn reset(&self, account: &AccountId) -> Result<bool, Error> {
        self.clear(account, UnlockReason::AdminReset).await
    }

    /// Check that the ledger is reachable.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repository.health_check().await
    }

    async fn clear(&self, account: &AccountId, reason: UnlockReason) -> Result<bool, Error> {
        let _guard = self.locks.lock(account).await;

        let Applied {
            before,
            expired,
            now,
            ..
        } = self.apply(account, |record, _| record.reset()).await?;

        let was_locked = before.is_locked_at(now);
        if expired {
            self.emit_unlocked(account, UnlockReason::LockoutExpired, now)
                .await;
        } else if was_locked {
            tracing::info!(account = %account, ?reason, "Account unlocked");
            self.emit_unlocked(account, reason, now).await;
        }

        Ok(was_locked)
    }

    /// Load a record for a read path and clear it if its lockout has expired.
    ///
    /// A failed write of the cleared record is logged and otherwise ignored:
    /// the decision is the same either way and the next call retries it.
    async fn observe(&self, account: &AccountId, now: DateTime<Utc>) -> Result<AttemptRecord, Error> {
        let mut record = self.load(account).await?;
        if !record.clear_if_expired(now) {
            return Ok(record);
        }

        let first = self.repository.save(&record).await;
        let (saved, cleared) = match first {
            Err(e) if e.is_conflict() => {
                // Someone else wrote first; re-read and clear against their state.
                let mut fresh = self.load(account).await?;
                if !fresh.clear_if_expired(now) {
                    return Ok(fresh);
                }
                let second = self.repository.save(&fresh).await;
                (second, fresh)
            }
            other => (other, record),
        };

        match saved {
            Ok(stored) => {
                self.emit_unlocked(account, UnlockReason::LockoutExpired, now)
                    .await;
                Ok(stored)
            }
            Err(e) => {
                tracing::warn!(
                    account = %account,
                    error = %e,
                    "Failed to persist lockout expiry; will retry on next access"
                );
                Ok(cleared)
            }
        }
    }

    /// Run one read-modify-write, retrying once on a version conflict.
    ///
    /// Nothing is written when `transition` leaves the record unchanged.
    async fn apply<F>(&self, account: &AccountId, transition: F) -> Result<Applied, Error>
    where
        F: Fn(&mut AttemptRecord, DateTime<Utc>),
    {
        let mut retried = false;
        loop {
            let now = self.clock.now();
            let before = self.load(account).await?;
            let mut after = before.clone();
            let expired = after.clear_if_expired(now);
            transition(&mut after, now);

            if after == before {
                return Ok(Applied {
                    before,
                    after,
                    expired,
                    now,
                });
            }

            match self.repository.save(&after).await {
                Ok(stored) => {
                    return Ok(Applied {
                        before,
                        after: stored,
                        expired,
                        now,
                    });
                }
                Err(e) if e.is_conflict() && !retried => {
                    tracing::debug!(account = %account, "Attempt record changed underneath us, retrying");
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn load(&self, account: &AccountId) -> Result<AttemptRecord, Error> {
        Ok(self
            .repository
            .find(account)
            .await?
            .unwrap_or_else(|| AttemptRecord::new(account.clone())))
    }

    fn fail_open(&self, account: &AccountId, error: Error) -> Result<AttemptRecord, Error> {
        if error.is_storage_error()
            && self.config.read_failure_policy == ReadFailurePolicy::FailOpen
        {
            tracing::warn!(
                account = %account,
                error = %error,
                "Attempt ledger unavailable; failing open"
            );
            return Ok(AttemptRecord::new(account.clone()));
        }
        Err(error)
    }

    async fn emit_unlocked(&self, account: &AccountId, reason: UnlockReason, now: DateTime<Utc>) {
        self.emit(Event::AccountUnlocked {
            account: account.clone(),
            reason,
            timestamp: now,
        })
        .await;
    }

    async fn emit(&self, event: Event) {
        if let Some(bus) = &self.events {
            if let Err(e) = bus.emit(&event).await {
                tracing::warn!(error = %e, ?event, "Event handler failed");
            }
        }
    }
}

/// Per-account async mutexes.
///
/// Entries are created on demand and dropped again once no task holds or
/// waits on them.
#[derive(Default)]
struct AccountLocks {
    inner: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountLocks {
    async fn lock(&self, account: &AccountId) -> AccountGuard<'_> {
        let mutex = Arc::clone(&self.inner.entry(account.clone()).or_default());
        let guard = mutex.lock_owned().await;
        AccountGuard {
            locks: self,
            account: account.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

struct AccountGuard<'a> {
    locks: &'a AccountLocks,
    account: AccountId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .inner
            .remove_if(&self.account, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
