pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Throttle error: {0}")]
    Throttle(#[from] ThrottleError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("Account is locked for {seconds_remaining} more seconds")]
    Locked { seconds_remaining: u64 },
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Credential verifier failed: {0}")]
    Verifier(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Concurrent modification of attempt record for {0}")]
    Conflict(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid account identifier: {0}")]
    InvalidAccountId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Returned by an [`EventHandler`](crate::events::EventHandler). The engine
/// logs it and carries on.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

impl Error {
    pub fn is_locked(&self) -> bool {
        matches!(self, Error::Throttle(ThrottleError::Locked { .. }))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// A compare-and-swap miss at the ledger.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Storage(StorageError::Conflict(_)))
    }
}
