//! Login orchestration around the throttle service.
//!
//! [`LoginService`] is the glue between the throttle engine and the two
//! systems it deliberately does not own: the user store ([`AccountDirectory`])
//! and the password check ([`CredentialVerifier`]). The sequence is:
//!
//! 1. `evaluate`; a locked account is rejected before the verifier runs
//! 2. unknown accounts are reported without touching throttle state
//! 3. the verifier runs
//! 4. success clears the counter, failure counts against it

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    AccountId, Error, error::ThrottleError, repositories::AttemptLedger,
    services::throttle::ThrottleService, storage::Snapshot,
};

/// The user store, as far as throttling is concerned.
#[async_trait]
pub trait AccountDirectory: Send + Sync + 'static {
    async fn account_exists(&self, account: &AccountId) -> Result<bool, Error>;
}

/// External password (or other secret) check.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    /// `Ok(false)` means the secret was wrong. `Err` means the verifier itself
    /// failed and no attempt should be counted.
    async fn verify(&self, account: &AccountId, secret: &str) -> Result<bool, Error>;
}

/// What happened to a login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginOutcome {
    Authenticated,
    /// Wrong secret; the account is still open.
    InvalidCredentials { attempts_left: u32 },
    /// The account was already locked; the verifier was not called.
    Locked { seconds_remaining: u64 },
    /// This failure (or a concurrent one) pushed the account into lockout.
    NowLocked { seconds_remaining: u64 },
    AccountNotFound,
}

/// Result of a status poll for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Open(Snapshot),
    Locked(Snapshot),
    AccountNotFound,
}

pub struct LoginService<R: AttemptLedger> {
    throttle: Arc<ThrottleService<R>>,
    directory: Arc<dyn AccountDirectory>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl<R: AttemptLedger> LoginService<R> {
    pub fn new(
        throttle: Arc<ThrottleService<R>>,
        directory: Arc<dyn AccountDirectory>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            throttle,
            directory,
            verifier,
        }
    }

    pub fn throttle(&self) -> &ThrottleService<R> {
        &self.throttle
    }

    /// Run one login attempt through the throttle.
    pub async fn attempt(&self, account: &AccountId, secret: &str) -> Result<LoginOutcome, Error> {
        let decision = self.throttle.evaluate(account).await?;
        let baseline = decision.attempts_left;
        if let Err(ThrottleError::Locked { seconds_remaining }) = decision.ensure_allowed() {
            tracing::debug!(account = %account, seconds_remaining, "Rejected login for locked account");
            return Ok(LoginOutcome::Locked { seconds_remaining });
        }

        if !self.directory.account_exists(account).await? {
            return Ok(LoginOutcome::AccountNotFound);
        }

        if self.verifier.verify(account, secret).await? {
            self.throttle.record_success(account).await?;
            tracing::info!(account = %account, "Login succeeded");
            return Ok(LoginOutcome::Authenticated);
        }

        let decision = match self.throttle.record_failure(account).await {
            Ok(decision) => decision,
            Err(e) if e.is_storage_error() => {
                return self.confirm_failure(account, baseline, e).await;
            }
            Err(e) => return Err(e),
        };

        Ok(if decision.allowed {
            LoginOutcome::InvalidCredentials {
                attempts_left: decision.attempts_left,
            }
        } else {
            LoginOutcome::NowLocked {
                seconds_remaining: decision.seconds_remaining,
            }
        })
    }

    /// The failed-attempt write errored, so it may or may not have landed.
    /// Only report a typed outcome if the ledger shows the failure counted;
    /// otherwise the attempt fails closed with the original error.
    async fn confirm_failure(
        &self,
        account: &AccountId,
        baseline_attempts_left: u32,
        error: Error,
    ) -> Result<LoginOutcome, Error> {
        let snapshot = match self.throttle.status(account).await {
            Ok(snapshot) => snapshot,
            Err(_) => return Err(error),
        };

        if snapshot.is_locked {
            return Ok(LoginOutcome::NowLocked {
                seconds_remaining: snapshot.seconds_remaining,
            });
        }
        if snapshot.attempts_left < baseline_attempts_left {
            return Ok(LoginOutcome::InvalidCredentials {
                attempts_left: snapshot.attempts_left,
            });
        }

        tracing::error!(
            account = %account,
            error = %error,
            "Failed attempt was not recorded; rejecting login"
        );
        Err(error)
    }

    /// Status poll: unknown accounts first, then the throttle snapshot.
    pub async fn status(&self, account: &AccountId) -> Result<StatusOutcome, Error> {
        if !self.directory.account_exists(account).await? {
            return Ok(StatusOutcome::AccountNotFound);
        }

        let snapshot = self.throttle.status(account).await?;
        Ok(if snapshot.is_locked {
            StatusOutcome::Locked(snapshot)
        } else {
            StatusOutcome::Open(snapshot)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        config::ThrottleConfig,
        error::{AccountError, StorageError},
        repositories::InMemoryAttemptLedger,
        storage::AttemptRecord,
    };
    use chrono::Duration;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    struct StaticAccounts {
        passwords: HashMap<String, String>,
        verify_calls: AtomicUsize,
    }

    impl StaticAccounts {
        fn new(entries: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                passwords: entries
                    .iter()
                    .map(|(e, p)| (e.to_string(), p.to_string()))
                    .collect(),
                verify_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AccountDirectory for StaticAccounts {
        async fn account_exists(&self, account: &AccountId) -> Result<bool, Error> {
            Ok(self.passwords.contains_key(account.as_str()))
        }
    }

    #[async_trait]
    impl CredentialVerifier for StaticAccounts {
        async fn verify(&self, account: &AccountId, secret: &str) -> Result<bool, Error> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.passwords.get(account.as_str()).map(String::as_str) == Some(secret))
        }
    }

    struct BrokenVerifier;

    #[async_trait]
    impl CredentialVerifier for BrokenVerifier {
        async fn verify(&self, _account: &AccountId, _secret: &str) -> Result<bool, Error> {
            Err(AccountError::Verifier("identity provider timed out".into()).into())
        }
    }

    /// Ledger that can reject writes while still serving reads.
    #[derive(Default)]
    struct WriteFailingLedger {
        inner: InMemoryAttemptLedger,
        writes_down: AtomicBool,
    }

    #[async_trait]
    impl AttemptLedger for WriteFailingLedger {
        async fn find(&self, account: &AccountId) -> Result<Option<AttemptRecord>, Error> {
            self.inner.find(account).await
        }

        async fn save(&self, record: &AttemptRecord) -> Result<AttemptRecord, Error> {
            if self.writes_down.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("timeout".into()).into());
            }
            self.inner.save(record).await
        }

        async fn health_check(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn account(email: &str) -> AccountId {
        AccountId::parse(email).unwrap()
    }

    fn login_service(
        accounts: Arc<StaticAccounts>,
    ) -> (LoginService<InMemoryAttemptLedger>, ManualClock) {
        let clock = ManualClock::default();
        let throttle = Arc::new(
            ThrottleService::new(
                Arc::new(InMemoryAttemptLedger::new()),
                ThrottleConfig::default(),
            )
            .with_clock(Arc::new(clock.clone())),
        );
        (
            LoginService::new(throttle, accounts.clone(), accounts),
            clock,
        )
    }

    #[tokio::test]
    async fn test_successful_login() {
        let accounts = StaticAccounts::new(&[("alice@example.com", "hunter2")]);
        let (service, _) = login_service(accounts);

        let outcome = service
            .attempt(&account("alice@example.com"), "hunter2")
            .await
            .unwrap();
        assert_eq!(outcome, LoginOutcome::Authenticated);
    }

    #[tokio::test]
    async fn test_failures_then_lockout() {
        let accounts = StaticAccounts::new(&[("alice@example.com", "hunter2")]);
        let (service, _) = login_service(accounts.clone());
        let alice = account("alice@example.com");

        assert_eq!(
            service.attempt(&alice, "wrong").await.unwrap(),
            LoginOutcome::InvalidCredentials { attempts_left: 2 }
        );
        assert_eq!(
            service.attempt(&alice, "wrong").await.unwrap(),
            LoginOutcome::InvalidCredentials { attempts_left: 1 }
        );
        assert_eq!(
            service.attempt(&alice, "wrong").await.unwrap(),
            LoginOutcome::NowLocked {
                seconds_remaining: 60
            }
        );

        // Even the right password is refused, and the verifier is not consulted.
        let calls = accounts.verify_calls.load(Ordering::SeqCst);
        assert_eq!(
            service.attempt(&alice, "hunter2").await.unwrap(),
            LoginOutcome::Locked {
                seconds_remaining: 60
            }
        );
        assert_eq!(accounts.verify_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_lockout_lifts_after_expiry() {
        let accounts = StaticAccounts::new(&[("alice@example.com", "hunter2")]);
        let (service, clock) = login_service(accounts);
        let alice = account("alice@example.com");

        for _ in 0..3 {
            service.attempt(&alice, "wrong").await.unwrap();
        }
        clock.advance(Duration::seconds(61));

        assert_eq!(
            service.attempt(&alice, "hunter2").await.unwrap(),
            LoginOutcome::Authenticated
        );
    }

    #[tokio::test]
    async fn test_unknown_account_does_not_touch_throttle() {
        let accounts = StaticAccounts::new(&[]);
        let (service, _) = login_service(accounts.clone());
        let ghost = account("ghost@example.com");

        for _ in 0..5 {
            assert_eq!(
                service.attempt(&ghost, "guess").await.unwrap(),
                LoginOutcome::AccountNotFound
            );
        }
        assert_eq!(accounts.verify_calls.load(Ordering::SeqCst), 0);
        assert!(!service.throttle().status(&ghost).await.unwrap().exists);
        assert_eq!(
            service.status(&ghost).await.unwrap(),
            StatusOutcome::AccountNotFound
        );
    }

    #[tokio::test]
    async fn test_verifier_error_is_not_counted() {
        let accounts = StaticAccounts::new(&[("alice@example.com", "hunter2")]);
        let throttle = Arc::new(ThrottleService::new(
            Arc::new(InMemoryAttemptLedger::new()),
            ThrottleConfig::default(),
        ));
        let service = LoginService::new(throttle.clone(), accounts, Arc::new(BrokenVerifier));
        let alice = account("alice@example.com");

        let err = service.attempt(&alice, "hunter2").await.unwrap_err();
        assert!(matches!(err, Error::Account(AccountError::Verifier(_))));
        assert_eq!(throttle.status(&alice).await.unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn test_unrecorded_failure_fails_closed() {
        let accounts = StaticAccounts::new(&[("alice@example.com", "hunter2")]);
        let ledger = Arc::new(WriteFailingLedger::default());
        let throttle = Arc::new(ThrottleService::new(ledger.clone(), ThrottleConfig::default()));
        let service = LoginService::new(throttle.clone(), accounts.clone(), accounts);
        let alice = account("alice@example.com");

        service.attempt(&alice, "wrong").await.unwrap();
        ledger.writes_down.store(true, Ordering::SeqCst);

        for _ in 0..10 {
            let err = service.attempt(&alice, "wrong").await.unwrap_err();
            assert!(err.is_storage_error());
        }
        assert_eq!(throttle.status(&alice).await.unwrap().failure_count, 1);

        // Clearing the recorded failure needs a write too, so the right
        // password cannot get through while the ledger is read-only.
        let err = service.attempt(&alice, "hunter2").await.unwrap_err();
        assert!(err.is_storage_error());

        ledger.writes_down.store(false, Ordering::SeqCst);
        assert_eq!(
            service.attempt(&alice, "wrong").await.unwrap(),
            LoginOutcome::InvalidCredentials { attempts_left: 1 }
        );
    }

    /// Ledger whose save lands but reports an error to the caller.
    #[derive(Default)]
    struct LostAckLedger {
        inner: InMemoryAttemptLedger,
    }

    #[async_trait]
    impl AttemptLedger for LostAckLedger {
        async fn find(&self, account: &AccountId) -> Result<Option<AttemptRecord>, Error> {
            self.inner.find(account).await
        }

        async fn save(&self, record: &AttemptRecord) -> Result<AttemptRecord, Error> {
            self.inner.save(record).await?;
            Err(StorageError::Unavailable("connection reset".into()).into())
        }

        async fn health_check(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_that_landed_is_reported() {
        let accounts = StaticAccounts::new(&[("alice@example.com", "hunter2")]);
        let throttle = Arc::new(ThrottleService::new(
            Arc::new(LostAckLedger::default()),
            ThrottleConfig::default(),
        ));
        let service = LoginService::new(throttle, accounts.clone(), accounts);
        let alice = account("alice@example.com");

        assert_eq!(
            service.attempt(&alice, "wrong").await.unwrap(),
            LoginOutcome::InvalidCredentials { attempts_left: 2 }
        );
        assert_eq!(
            service.attempt(&alice, "wrong").await.unwrap(),
            LoginOutcome::InvalidCredentials { attempts_left: 1 }
        );
        assert_eq!(
            service.attempt(&alice, "wrong").await.unwrap(),
            LoginOutcome::NowLocked {
                seconds_remaining: 60
            }
        );
    }

    #[tokio::test]
    async fn test_status_outcomes() {
        let accounts = StaticAccounts::new(&[("alice@example.com", "hunter2")]);
        let (service, _) = login_service(accounts);
        let alice = account("alice@example.com");

        match service.status(&alice).await.unwrap() {
            StatusOutcome::Open(snapshot) => assert_eq!(snapshot.attempts_left, 3),
            other => panic!("expected open, got {other:?}"),
        }

        for _ in 0..3 {
            service.attempt(&alice, "wrong").await.unwrap();
        }

        match service.status(&alice).await.unwrap() {
            StatusOutcome::Locked(snapshot) => assert_eq!(snapshot.seconds_remaining, 60),
            other => panic!("expected locked, got {other:?}"),
        }
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(LoginOutcome::InvalidCredentials { attempts_left: 2 })
            .unwrap();
        assert_eq!(json["status"], "invalid_credentials");
        assert_eq!(json["attempts_left"], 2);
    }
}
