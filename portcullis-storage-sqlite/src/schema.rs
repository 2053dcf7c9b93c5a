//! Attempt-ledger schema.
//!
//! The schema is a fixed list of numbered steps. Each step runs in its own
//! transaction and is recorded in `_portcullis_schema`, so [`apply`] can be
//! run on every startup and [`ensure_current`] can tell a health check
//! whether this database is usable by this build.

use chrono::Utc;
use portcullis_core::{Error, error::StorageError};
use sqlx::SqlitePool;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i64 = 2;

struct Step {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

// Timestamps are Unix milliseconds.
const STEPS: &[Step] = &[
    Step {
        version: 1,
        description: "create attempt_ledger",
        sql: r#"
            CREATE TABLE IF NOT EXISTS attempt_ledger (
                account_id TEXT PRIMARY KEY NOT NULL,
                failure_count INTEGER NOT NULL DEFAULT 0 CHECK (failure_count >= 0),
                locked_until INTEGER,
                last_failure_at INTEGER,
                version INTEGER NOT NULL CHECK (version > 0),
                updated_at INTEGER NOT NULL
            )
        "#,
    },
    Step {
        version: 2,
        description: "index locked accounts",
        sql: "CREATE INDEX IF NOT EXISTS idx_attempt_ledger_locked_until \
              ON attempt_ledger(locked_until) WHERE locked_until IS NOT NULL",
    },
];

fn schema_error(context: &str, e: sqlx::Error) -> Error {
    tracing::error!(error = %e, "{context}");
    Error::Storage(StorageError::Migration(format!("{context}: {e}")))
}

/// Bring the database up to [`SCHEMA_VERSION`]. Already-applied steps are
/// skipped.
pub async fn apply(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _portcullis_schema (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| schema_error("Failed to create schema table", e))?;

    for step in STEPS {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| schema_error("Failed to start schema transaction", e))?;

        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _portcullis_schema WHERE version = ?)")
                .bind(step.version)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| schema_error("Failed to read schema version", e))?;
        if applied {
            continue;
        }

        tracing::info!(version = step.version, step = step.description, "Applying schema step");

        sqlx::query(step.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| schema_error(step.description, e))?;

        sqlx::query(
            "INSERT INTO _portcullis_schema (version, description, applied_at) VALUES (?, ?, ?)",
        )
        .bind(step.version)
        .bind(step.description)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| schema_error("Failed to record schema step", e))?;

        tx.commit()
            .await
            .map_err(|e| schema_error("Failed to commit schema step", e))?;
    }

    Ok(())
}

/// Highest applied step, or 0 for a database that was never migrated.
pub async fn current_version(pool: &SqlitePool) -> Result<i64, Error> {
    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_portcullis_schema')",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| schema_error("Failed to inspect schema", e))?;
    if !tracked {
        return Ok(0);
    }

    sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM _portcullis_schema")
        .fetch_one(pool)
        .await
        .map_err(|e| schema_error("Failed to read schema version", e))
}

/// Fail unless the database is at exactly [`SCHEMA_VERSION`].
pub async fn ensure_current(pool: &SqlitePool) -> Result<(), Error> {
    let version = current_version(pool).await?;
    if version == SCHEMA_VERSION {
        return Ok(());
    }

    let message = if version < SCHEMA_VERSION {
        format!("schema at version {version}, expected {SCHEMA_VERSION}; run migrations")
    } else {
        format!("schema at version {version} is newer than this build ({SCHEMA_VERSION})")
    };
    tracing::warn!(version, expected = SCHEMA_VERSION, "Attempt ledger schema mismatch");
    Err(Error::Storage(StorageError::Migration(message)))
}
