//! SQLite storage backend for portcullis
//!
//! Provides [`SqliteAttemptLedger`], a durable attempt ledger whose writes are
//! version-checked so several processes can share one database file, and
//! [`SqliteRepositoryProvider`], which bundles it with the [`schema`] steps
//! and a health check that verifies the schema version.
//!
//! ```rust,no_run
//! use portcullis_storage_sqlite::SqliteStorage;
//! use portcullis_core::RepositoryProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = SqliteStorage::connect("sqlite://attempts.db").await?;
//! let repositories = storage.into_repository_provider();
//! repositories.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod repositories;
pub mod schema;

use std::str::FromStr;

use portcullis_core::{Error, RepositoryProvider, error::StorageError};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};

pub use repositories::{SqliteAttemptLedger, SqliteRepositoryProvider};
pub use schema::SCHEMA_VERSION;

/// Connection handle for the SQLite backend.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url`.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::Connection(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            tracing::error!(error = %e, url, "Failed to connect to SQLite");
            StorageError::Connection(e.to_string())
        })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_repository_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }

    /// Apply any pending schema migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        SqliteRepositoryProvider::new(self.pool.clone())
            .migrate()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::{AccountId, AttemptLedger, AttemptLedgerProvider};

    #[tokio::test]
    async fn test_connect_and_migrate() {
        let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();

        let provider = storage.into_repository_provider();
        let account = AccountId::parse("test@example.com").unwrap();
        assert!(provider.ledger().find(&account).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connect_fails_for_missing_directory() {
        let err = SqliteStorage::connect("sqlite:///portcullis-missing-dir/attempts.db")
            .await
            .unwrap_err();
        assert!(err.is_storage_error());
    }
}
