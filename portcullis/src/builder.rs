//! Builder pattern for constructing Portcullis instances
//!
//! This module provides a type-safe builder for creating [`Portcullis`]
//! instances with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use portcullis::PortcullisBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let portcullis = PortcullisBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or keep everything in memory
//!     let portcullis = PortcullisBuilder::new().with_memory().build().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use portcullis_core::{
    AttemptLedgerProvider, Clock, ReadFailurePolicy, RepositoryProvider, ThrottleConfig,
    events::EventBus, repositories::InMemoryRepositoryProvider, services::ThrottleService,
};

use crate::Portcullis;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Portcullis instance.
#[derive(Debug, thiserror::Error)]
pub enum PortcullisBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Portcullis`] instances.
///
/// Storage must be chosen before [`build`](PortcullisBuilder::build) becomes
/// available.
///
/// # Defaults
///
/// - 3 attempts, 60 second lockout
/// - Reads fail closed
/// - System clock
/// - No event bus
/// - Migrations not applied
pub struct PortcullisBuilder<Storage> {
    storage: Storage,
    config: ThrottleConfig,
    clock: Option<Arc<dyn Clock>>,
    events: Option<EventBus>,
    apply_migrations: bool,
}

impl Default for PortcullisBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl PortcullisBuilder<NoStorage> {
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: ThrottleConfig::default(),
            clock: None,
            events: None,
            apply_migrations: false,
        }
    }

    /// Use an existing repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> PortcullisBuilder<WithStorage<R>> {
        PortcullisBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            clock: self.clock,
            events: self.events,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Keep attempt records in process memory. State is lost on restart and
    /// not shared between processes.
    pub fn with_memory(self) -> PortcullisBuilder<WithStorage<InMemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(InMemoryRepositoryProvider::new()))
    }
}

#[cfg(feature = "sqlite")]
impl PortcullisBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// The database file is created if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        PortcullisBuilder<WithStorage<crate::SqliteRepositoryProvider>>,
        PortcullisBuilderError,
    > {
        let storage = crate::SqliteStorage::connect(url)
            .await
            .map_err(|e| PortcullisBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(storage.into_repository_provider())))
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> PortcullisBuilder<WithStorage<R>> {
    /// Replace the whole throttle configuration.
    pub fn with_throttle_config(mut self, config: ThrottleConfig) -> Self {
        self.config = config;
        self
    }

    /// Consecutive failures that trigger a lockout.
    ///
    /// Default: 3
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Default: 60 seconds
    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.config.lockout_duration = duration;
        self
    }

    /// What to do when the ledger cannot be read.
    ///
    /// Default: [`ReadFailurePolicy::FailClosed`]
    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.config.read_failure_policy = policy;
        self
    }

    /// Replace the time source, typically with a
    /// [`ManualClock`](crate::ManualClock) in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Publish lockout events to `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the Portcullis instance.
    ///
    /// Fails if the throttle configuration is invalid or, when
    /// `apply_migrations(true)` was set, if migrations fail.
    pub async fn build(self) -> Result<Portcullis<R>, PortcullisBuilderError> {
        self.config
            .validate()
            .map_err(|e| PortcullisBuilderError::InvalidConfiguration(e.to_string()))?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| PortcullisBuilderError::Migration(e.to_string()))?;
        }

        let ledger = Arc::new(self.storage.repositories.ledger().clone());
        let mut throttle = ThrottleService::new(ledger, self.config);
        if let Some(clock) = self.clock {
            throttle = throttle.with_clock(clock);
        }
        if let Some(bus) = self.events {
            throttle = throttle.with_event_bus(bus);
        }

        tracing::debug!(config = ?throttle.config(), "Built portcullis instance");

        Ok(Portcullis::from_parts(self.storage.repositories, throttle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_with_memory() {
        let portcullis = PortcullisBuilder::new()
            .with_memory()
            .with_max_attempts(5)
            .with_lockout_duration(Duration::minutes(15))
            .build()
            .await
            .unwrap();

        assert_eq!(portcullis.config().max_attempts, 5);
        assert_eq!(portcullis.config().lockout_duration, Duration::minutes(15));
        portcullis.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_build_rejects_zero_attempts() {
        let result = PortcullisBuilder::new()
            .with_memory()
            .with_max_attempts(0)
            .build()
            .await;

        assert!(matches!(
            result,
            Err(PortcullisBuilderError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_build_rejects_negative_lockout() {
        let result = PortcullisBuilder::new()
            .with_memory()
            .with_lockout_duration(Duration::seconds(-1))
            .build()
            .await;

        assert!(matches!(
            result,
            Err(PortcullisBuilderError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_build_rejects_lockout_longer_than_a_year() {
        let result = PortcullisBuilder::new()
            .with_memory()
            .with_lockout_duration(Duration::days(366))
            .build()
            .await;

        assert!(matches!(
            result,
            Err(PortcullisBuilderError::InvalidConfiguration(_))
        ));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_build_with_sqlite_and_migrations() {
        let portcullis = PortcullisBuilder::new()
            .with_sqlite("sqlite::memory:")
            .await
            .unwrap()
            .apply_migrations(true)
            .build()
            .await
            .unwrap();

        portcullis.health_check().await.unwrap();
        let account = crate::AccountId::parse("user@example.com").unwrap();
        assert!(portcullis.evaluate(&account).await.unwrap().allowed);
    }
}
