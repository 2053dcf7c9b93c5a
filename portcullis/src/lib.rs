//! # Portcullis
//!
//! Portcullis throttles login attempts per account. After a configurable number
//! of consecutive failures the account is locked for a fixed period; further
//! attempts are rejected without being counted, and the lockout clears itself
//! the next time the account is touched after it expires.
//!
//! The crate does not verify passwords or store users. Plug your own
//! [`AccountDirectory`] and [`CredentialVerifier`] into a [`LoginService`]
//! via [`Portcullis::login_service`], or call the throttle operations directly.
//!
//! ## Storage Support
//!
//! - In-memory (single process, lost on restart)
//! - SQLite (`sqlite` feature, enabled by default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use portcullis::{AccountId, PortcullisBuilder, ThrottleConfig};
//! use chrono::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let portcullis = PortcullisBuilder::new()
//!         .with_sqlite("sqlite://attempts.db")
//!         .await?
//!         .with_throttle_config(ThrottleConfig::new(3, Duration::seconds(60)))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let account = AccountId::parse("user@example.com")?;
//!     if portcullis.evaluate(&account).await?.allowed {
//!         // check the password, then record the outcome
//!         portcullis.record_failure(&account).await?;
//!     }
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use portcullis_core::{AttemptLedgerProvider, RepositoryProvider, services::ThrottleService};

mod builder;

pub use builder::{NoStorage, PortcullisBuilder, PortcullisBuilderError, WithStorage};

/// Re-export core types from portcullis_core
pub use portcullis_core::{
    AccountDirectory, AccountId, Clock, CredentialVerifier, Decision, Error, LoginOutcome,
    LoginService, ManualClock, ReadFailurePolicy, Snapshot, StatusOutcome, SystemClock, ThrottleConfig,
    config::{DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_ATTEMPTS},
    error::{EventError, ValidationError},
    events::{Event, EventBus, EventHandler, UnlockReason},
    repositories::{InMemoryAttemptLedger, InMemoryRepositoryProvider},
};

/// Re-export storage backends
#[cfg(feature = "sqlite")]
pub use portcullis_storage_sqlite::{SqliteAttemptLedger, SqliteRepositoryProvider, SqliteStorage};

/// Errors returned by the [`Portcullis`] facade.
#[derive(Debug, thiserror::Error)]
pub enum PortcullisError {
    /// The ledger could not be read or written
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Malformed account identifier or configuration
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Throttle error: {0}")]
    ThrottleError(String),
}

impl From<portcullis_core::Error> for PortcullisError {
    fn from(err: portcullis_core::Error) -> Self {
        if err.is_storage_error() {
            PortcullisError::StorageError(err.to_string())
        } else if err.is_validation_error() {
            PortcullisError::ValidationError(err.to_string())
        } else {
            PortcullisError::ThrottleError(err.to_string())
        }
    }
}

/// Entry point tying a storage backend to the throttle engine.
///
/// Cheap to share: wrap it in an `Arc` or clone the services it hands out.
pub struct Portcullis<R: RepositoryProvider> {
    repositories: Arc<R>,
    throttle: Arc<ThrottleService<R::Ledger>>,
}

impl<R: RepositoryProvider> Portcullis<R> {
    /// Create a new Portcullis instance with the default configuration and
    /// the system clock.
    pub fn new(repositories: Arc<R>) -> Self {
        let ledger = Arc::new(repositories.ledger().clone());
        let throttle = ThrottleService::new(ledger, ThrottleConfig::default());
        Self::from_parts(repositories, throttle)
    }

    pub(crate) fn from_parts(repositories: Arc<R>, throttle: ThrottleService<R::Ledger>) -> Self {
        Self {
            repositories,
            throttle: Arc::new(throttle),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        self.throttle.config()
    }

    /// The underlying throttle engine, for callers that need to share it.
    pub fn throttle(&self) -> Arc<ThrottleService<R::Ledger>> {
        Arc::clone(&self.throttle)
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), PortcullisError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| PortcullisError::StorageError(e.to_string()))
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), PortcullisError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| PortcullisError::StorageError(e.to_string()))
    }

    /// Should a login attempt for `account` proceed?
    ///
    /// Clears an expired lockout as a side effect.
    pub async fn evaluate(&self, account: &AccountId) -> Result<Decision, PortcullisError> {
        Ok(self.throttle.evaluate(account).await?)
    }

    /// Count a failed login. Failures against a locked account are not
    /// counted and do not extend the lockout.
    pub async fn record_failure(&self, account: &AccountId) -> Result<Decision, PortcullisError> {
        Ok(self.throttle.record_failure(account).await?)
    }

    /// Reset the failure counter after a successful login.
    pub async fn record_success(&self, account: &AccountId) -> Result<(), PortcullisError> {
        Ok(self.throttle.record_success(account).await?)
    }

    /// Read-only view of the account's throttle state.
    pub async fn status(&self, account: &AccountId) -> Result<Snapshot, PortcullisError> {
        Ok(self.throttle.status(account).await?)
    }

    /// Administrative unlock. Returns whether the account was locked.
    pub async fn reset(&self, account: &AccountId) -> Result<bool, PortcullisError> {
        Ok(self.throttle.reset(account).await?)
    }

    /// Build a [`LoginService`] around this instance's throttle engine.
    pub fn login_service(
        &self,
        directory: Arc<dyn AccountDirectory>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> LoginService<R::Ledger> {
        LoginService::new(self.throttle(), directory, verifier)
    }
}
