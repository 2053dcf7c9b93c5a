use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::types::ACCOUNT_NOT_FOUND_MESSAGE;

/// Shown for every server-side failure; storage details stay in the logs.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong, please try again";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<portcullis_core::Error> for ApiError {
    fn from(err: portcullis_core::Error) -> Self {
        if err.is_validation_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

impl From<portcullis_core::error::ValidationError> for ApiError {
    fn from(err: portcullis_core::error::ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            ApiError::AccountNotFound => (StatusCode::NOT_FOUND, ACCOUNT_NOT_FOUND_MESSAGE),
            ApiError::InternalError(ref msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE)
            }
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
