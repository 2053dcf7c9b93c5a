use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use portcullis_core::{AccountId, LoginService, StatusOutcome, repositories::AttemptLedger};

use crate::{
    error::{ApiError, Result},
    types::*,
};

/// Shared state for the throttle routes.
pub struct ThrottleState<L: AttemptLedger> {
    pub login: Arc<LoginService<L>>,
}

impl<L: AttemptLedger> Clone for ThrottleState<L> {
    fn clone(&self) -> Self {
        Self {
            login: Arc::clone(&self.login),
        }
    }
}

pub fn create_router<L>(login: Arc<LoginService<L>>) -> Router
where
    L: AttemptLedger,
{
    let state = ThrottleState { login };

    Router::new()
        .route("/health", get(health_handler::<L>))
        .route("/status", post(status_handler::<L>))
        .route("/login", post(login_handler::<L>))
        .with_state(state)
}

async fn health_handler<L>(State(state): State<ThrottleState<L>>) -> Result<impl IntoResponse>
where
    L: AttemptLedger,
{
    state.login.throttle().health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn status_handler<L>(
    State(state): State<ThrottleState<L>>,
    payload: std::result::Result<Json<StatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    L: AttemptLedger,
{
    let Json(request) = payload?;
    let account = AccountId::parse(&request.account_id)?;

    match state.login.status(&account).await? {
        StatusOutcome::AccountNotFound => Err(ApiError::AccountNotFound),
        StatusOutcome::Open(snapshot) | StatusOutcome::Locked(snapshot) => {
            Ok(StatusResponse::from(snapshot))
        }
    }
}

async fn login_handler<L>(
    State(state): State<ThrottleState<L>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    L: AttemptLedger,
{
    let Json(request) = payload?;
    let account = AccountId::parse(&request.account_id)?;

    let outcome = state.login.attempt(&account, &request.password).await?;
    Ok(LoginResponse::from_outcome(account, outcome))
}
