use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use portcullis_core::{AccountId, LoginOutcome, Snapshot};
use serde::{Deserialize, Serialize};

use crate::legacy::LegacyMessage;

pub const LOCKED_MESSAGE: &str = "Too many failed login attempts";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
pub const ACCOUNT_NOT_FOUND_MESSAGE: &str = "Account not found";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    #[serde(alias = "email")]
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub account_id: String,
    pub password: String,
}

/// Body of a status check.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StatusResponse {
    #[serde(rename_all = "camelCase")]
    Open {
        is_locked: bool,
        attempts_left: u32,
        failure_count: u32,
    },
    #[serde(rename_all = "camelCase")]
    Locked {
        is_locked: bool,
        time_left: u64,
        error: String,
    },
}

impl StatusResponse {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StatusResponse::Open { .. } => StatusCode::OK,
            StatusResponse::Locked { .. } => StatusCode::LOCKED,
        }
    }
}

impl From<Snapshot> for StatusResponse {
    fn from(snapshot: Snapshot) -> Self {
        if snapshot.is_locked {
            StatusResponse::Locked {
                is_locked: true,
                time_left: snapshot.seconds_remaining,
                error: LOCKED_MESSAGE.to_string(),
            }
        } else {
            StatusResponse::Open {
                is_locked: false,
                attempts_left: snapshot.attempts_left,
                failure_count: snapshot.failure_count,
            }
        }
    }
}

impl IntoResponse for StatusResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Body of a login attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "status",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum LoginResponse {
    Authenticated {
        account_id: AccountId,
    },
    InvalidCredentials {
        attempts_left: u32,
        error: String,
        legacy: String,
    },
    Locked {
        time_left: u64,
        error: String,
        legacy: String,
    },
    AccountNotFound {
        error: String,
    },
}

impl LoginResponse {
    pub fn from_outcome(account: AccountId, outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Authenticated => LoginResponse::Authenticated {
                account_id: account,
            },
            LoginOutcome::InvalidCredentials { attempts_left } => {
                LoginResponse::InvalidCredentials {
                    attempts_left,
                    error: INVALID_CREDENTIALS_MESSAGE.to_string(),
                    legacy: LegacyMessage::Attempts {
                        attempts_left,
                        message: INVALID_CREDENTIALS_MESSAGE.to_string(),
                    }
                    .to_string(),
                }
            }
            LoginOutcome::Locked { seconds_remaining }
            | LoginOutcome::NowLocked { seconds_remaining } => LoginResponse::Locked {
                time_left: seconds_remaining,
                error: LOCKED_MESSAGE.to_string(),
                legacy: LegacyMessage::Locked {
                    seconds_remaining,
                    message: LOCKED_MESSAGE.to_string(),
                }
                .to_string(),
            },
            LoginOutcome::AccountNotFound => LoginResponse::AccountNotFound {
                error: ACCOUNT_NOT_FOUND_MESSAGE.to_string(),
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LoginResponse::Authenticated { .. } => StatusCode::OK,
            LoginResponse::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            LoginResponse::Locked { .. } => StatusCode::LOCKED,
            LoginResponse::AccountNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_email_alias() {
        let req: StatusRequest =
            serde_json::from_value(json!({ "email": "a@example.com" })).unwrap();
        assert_eq!(req.account_id, "a@example.com");

        let req: LoginRequest = serde_json::from_value(
            json!({ "accountId": "a@example.com", "password": "pw" }),
        )
        .unwrap();
        assert_eq!(req.account_id, "a@example.com");
    }

    #[test]
    fn test_locked_login_body() {
        let account = AccountId::parse("a@example.com").unwrap();
        let response = LoginResponse::from_outcome(
            account,
            LoginOutcome::NowLocked {
                seconds_remaining: 60,
            },
        );
        assert_eq!(response.status_code(), StatusCode::LOCKED);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "locked",
                "timeLeft": 60,
                "error": LOCKED_MESSAGE,
                "legacy": format!("LOCKED:60:{LOCKED_MESSAGE}"),
            })
        );
    }

    #[test]
    fn test_open_status_body() {
        let response = StatusResponse::from(Snapshot {
            exists: true,
            is_locked: false,
            seconds_remaining: 0,
            failure_count: 1,
            attempts_left: 2,
            last_failure_at: None,
        });
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "isLocked": false, "attemptsLeft": 2, "failureCount": 1 })
        );
    }
}
