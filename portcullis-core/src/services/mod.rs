//! Service layer for business logic
//!
//! [`ThrottleService`] owns the attempt ledger and the lockout state machine.
//! [`LoginService`] sequences a login attempt around it and the external
//! account directory and credential verifier.

pub mod login;
pub mod throttle;

pub use login::{AccountDirectory, CredentialVerifier, LoginOutcome, LoginService, StatusOutcome};
pub use throttle::ThrottleService;
