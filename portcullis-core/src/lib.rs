//! Core functionality for the portcullis project
//!
//! This crate contains the login throttle engine: the per-account attempt
//! record, the lockout state machine in [`ThrottleService`], the
//! [`AttemptLedger`] storage seam and the [`LoginService`] that sequences a
//! login attempt around an external credential verifier.
//!
//! Storage backends depend on this crate to implement [`AttemptLedger`] and
//! [`RepositoryProvider`]; application code normally goes through the
//! `portcullis` facade instead.
pub mod account;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod storage;

pub use account::AccountId;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ReadFailurePolicy, ThrottleConfig};
pub use error::Error;
pub use repositories::{AttemptLedger, AttemptLedgerProvider, RepositoryProvider};
pub use services::{
    AccountDirectory, CredentialVerifier, LoginOutcome, LoginService, StatusOutcome,
    ThrottleService,
};
pub use storage::{AttemptRecord, Decision, Snapshot, ThrottleState};
