//! SQLite implementation of the attempt ledger.
//!
//! Writes are conditional on the `version` column: an insert only succeeds if
//! no row exists yet, and an update only succeeds if the stored version still
//! matches the one the caller read. Zero affected rows means another writer
//! won and is reported as [`StorageError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portcullis_core::{
    AccountId, Error,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::AttemptLedger,
    storage::AttemptRecord,
};
use sqlx::SqlitePool;

/// SQLite-backed [`AttemptLedger`].
#[derive(Debug, Clone)]
pub struct SqliteAttemptLedger {
    pool: SqlitePool,
}

impl SqliteAttemptLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteAttemptRecord {
    account_id: String,
    failure_count: i64,
    locked_until: Option<i64>,
    last_failure_at: Option<i64>,
    version: i64,
}

impl TryFrom<SqliteAttemptRecord> for AttemptRecord {
    type Error = Error;

    fn try_from(row: SqliteAttemptRecord) -> Result<Self, Self::Error> {
        let account_id = AccountId::parse(&row.account_id).map_err(|e| {
            StorageError::Database(format!("Corrupt account id in attempt ledger: {e}"))
        })?;

        let failure_count = u32::try_from(row.failure_count).map_err(|_| {
            StorageError::Database(format!(
                "Corrupt failure count for {account_id}: {}",
                row.failure_count
            ))
        })?;
        let locked_until = row
            .locked_until
            .map(|ms| {
                DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                    StorageError::Database(format!("Corrupt lockout for {account_id}: {ms}"))
                })
            })
            .transpose()?;

        Ok(AttemptRecord {
            account_id,
            failure_count,
            locked_until,
            last_failure_at: row.last_failure_at.and_then(DateTime::from_timestamp_millis),
            version: row.version,
        })
    }
}

fn millis(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp_millis())
}

#[async_trait]
impl AttemptLedger for SqliteAttemptLedger {
    async fn find(&self, account: &AccountId) -> Result<Option<AttemptRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteAttemptRecord>(
            r#"
            SELECT account_id, failure_count, locked_until, last_failure_at, version
            FROM attempt_ledger
            WHERE account_id = ?
            "#,
        )
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to load attempt record")?;

        row.map(AttemptRecord::try_from).transpose()
    }

    async fn save(&self, record: &AttemptRecord) -> Result<AttemptRecord, Error> {
        let now = Utc::now().timestamp_millis();

        let result = if record.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO attempt_ledger
                    (account_id, failure_count, locked_until, last_failure_at, version, updated_at)
                VALUES (?, ?, ?, ?, 1, ?)
                ON CONFLICT(account_id) DO NOTHING
                "#,
            )
            .bind(record.account_id.as_str())
            .bind(i64::from(record.failure_count))
            .bind(millis(record.locked_until))
            .bind(millis(record.last_failure_at))
            .bind(now)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE attempt_ledger
                SET failure_count = ?,
                    locked_until = ?,
                    last_failure_at = ?,
                    version = version + 1,
                    updated_at = ?
                WHERE account_id = ? AND version = ?
                "#,
            )
            .bind(i64::from(record.failure_count))
            .bind(millis(record.locked_until))
            .bind(millis(record.last_failure_at))
            .bind(now)
            .bind(record.account_id.as_str())
            .bind(record.version)
            .execute(&self.pool)
            .await
        };
        let result = result.map_db_err_with_context("Failed to save attempt record")?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                account = %record.account_id,
                expected_version = record.version,
                "Attempt record version conflict"
            );
            return Err(StorageError::Conflict(record.account_id.to_string()).into());
        }

        let mut stored = record.clone();
        stored.version = record.version + 1;
        Ok(stored)
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Attempt ledger health check failed");
                StorageError::Unavailable(e.to_string())
            })?;
        Ok(())
    }
}
