//! Repository traits for the data access layer
//!
//! The throttle service talks to storage only through [`AttemptLedger`].
//! Storage backends expose their ledger through [`AttemptLedgerProvider`] and
//! add lifecycle methods via [`RepositoryProvider`], so the facade can run
//! migrations and health checks without knowing the backend.

pub mod attempt;
pub mod memory;

pub use attempt::AttemptLedger;
pub use memory::{InMemoryAttemptLedger, InMemoryRepositoryProvider};

use async_trait::async_trait;

use crate::Error;

/// Provider trait for attempt ledger access.
pub trait AttemptLedgerProvider: Send + Sync + 'static {
    /// The ledger implementation type
    type Ledger: AttemptLedger + Clone;

    /// Get the attempt ledger
    fn ledger(&self) -> &Self::Ledger;
}

/// Provider trait that storage implementations must implement.
///
/// # Example
///
/// ```rust,ignore
/// use portcullis_core::repositories::*;
///
/// struct MyStorage { ledger: MyLedger }
///
/// impl AttemptLedgerProvider for MyStorage {
///     type Ledger = MyLedger;
///     fn ledger(&self) -> &Self::Ledger { &self.ledger }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: AttemptLedgerProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
