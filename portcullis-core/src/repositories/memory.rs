//! In-process attempt ledger backed by a concurrent map.
//!
//! Suitable for single-node deployments that accept losing throttle state on
//! restart, and for tests.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    AccountId, Error,
    error::StorageError,
    repositories::{AttemptLedger, AttemptLedgerProvider, RepositoryProvider},
    storage::AttemptRecord,
};

#[derive(Debug, Clone, Default)]
pub struct InMemoryAttemptLedger {
    records: Arc<DashMap<AccountId, AttemptRecord>>,
}

impl InMemoryAttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AttemptLedger for InMemoryAttemptLedger {
    async fn find(&self, account: &AccountId) -> Result<Option<AttemptRecord>, Error> {
        Ok(self.records.get(account).map(|entry| entry.value().clone()))
    }

    async fn save(&self, record: &AttemptRecord) -> Result<AttemptRecord, Error> {
        let mut stored = record.clone();
        stored.version = record.version + 1;

        // The entry guard holds the shard lock, so check-and-write is atomic.
        match self.records.entry(record.account_id.clone()) {
            Entry::Occupied(mut entry) if entry.get().version == record.version => {
                entry.insert(stored.clone());
            }
            Entry::Vacant(entry) if record.version == 0 => {
                entry.insert(stored.clone());
            }
            _ => {
                return Err(StorageError::Conflict(record.account_id.to_string()).into());
            }
        }

        Ok(stored)
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Repository provider over [`InMemoryAttemptLedger`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepositoryProvider {
    ledger: InMemoryAttemptLedger,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttemptLedgerProvider for InMemoryRepositoryProvider {
    type Ledger = InMemoryAttemptLedger;

    fn ledger(&self) -> &Self::Ledger {
        &self.ledger
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        self.ledger.health_check().await
    }
}
