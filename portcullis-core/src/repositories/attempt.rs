//! Repository trait for the attempt ledger.

use async_trait::async_trait;

use crate::{AccountId, Error, storage::AttemptRecord};

/// Durable per-account store of failure counters and lockout expiry.
///
/// Only the throttle service writes to the ledger. Implementations must make
/// [`save`](AttemptLedger::save) a conditional write keyed on the record's
/// `version`, which is what keeps concurrent writers from losing increments
/// when the ledger is shared between processes.
#[async_trait]
pub trait AttemptLedger: Send + Sync + 'static {
    /// Load the record for an account, if one has ever been written.
    async fn find(&self, account: &AccountId) -> Result<Option<AttemptRecord>, Error>;

    /// Store `record` if the stored version still equals `record.version`.
    ///
    /// A version of `0` means "insert; no row may exist yet". On success the
    /// stored record is returned with its version bumped by one. If another
    /// writer got there first the call fails with
    /// [`StorageError::Conflict`](crate::error::StorageError::Conflict) and
    /// nothing is written.
    async fn save(&self, record: &AttemptRecord) -> Result<AttemptRecord, Error>;

    /// Verify that the backing store is reachable.
    async fn health_check(&self) -> Result<(), Error>;
}
