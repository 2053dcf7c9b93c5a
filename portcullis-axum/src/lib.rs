//! # Portcullis Axum Integration
//!
//! HTTP routes over a [`LoginService`]:
//!
//! - `POST /status` reports whether an account is locked and how many attempts
//!   it has left
//! - `POST /login` runs a throttled login attempt
//! - `GET /health` checks the attempt ledger
//!
//! Lockouts are answered with `423 Locked`, wrong passwords with
//! `401 Unauthorized`. Storage failures never leak details to the client.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use axum::Router;
//!
//! let login = Arc::new(portcullis.login_service(directory, verifier));
//! let app = Router::new().nest("/auth", portcullis_axum::routes(login));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

mod error;
pub mod legacy;
mod routes;
mod types;

pub use error::{ApiError, GENERIC_ERROR_MESSAGE, Result};
pub use legacy::LegacyMessage;
pub use routes::{ThrottleState, create_router};
pub use types::{
    ACCOUNT_NOT_FOUND_MESSAGE, HealthResponse, INVALID_CREDENTIALS_MESSAGE, LOCKED_MESSAGE,
    LoginRequest, LoginResponse, StatusRequest, StatusResponse,
};

use std::sync::Arc;

use axum::Router;
use portcullis_core::{LoginService, repositories::AttemptLedger};

/// Create the throttle routes. Nest the returned router at any path.
pub fn routes<L>(login: Arc<LoginService<L>>) -> Router
where
    L: AttemptLedger,
{
    create_router(login)
}
