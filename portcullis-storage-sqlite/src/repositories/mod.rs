//! Repository implementations for SQLite storage

pub mod attempt;

pub use attempt::SqliteAttemptLedger;

use async_trait::async_trait;
use portcullis_core::{
    Error,
    repositories::{AttemptLedger, AttemptLedgerProvider, RepositoryProvider},
};
use sqlx::SqlitePool;

use crate::schema;

/// Repository provider implementation for SQLite
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    ledger: SqliteAttemptLedger,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let ledger = SqliteAttemptLedger::new(pool.clone());
        Self { pool, ledger }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl AttemptLedgerProvider for SqliteRepositoryProvider {
    type Ledger = SqliteAttemptLedger;

    fn ledger(&self) -> &Self::Ledger {
        &self.ledger
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        schema::apply(&self.pool).await
    }

    /// The ledger must answer and its schema must match this build.
    async fn health_check(&self) -> Result<(), Error> {
        self.ledger.health_check().await?;
        schema::ensure_current(&self.pool).await
    }
}
