use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::{DateTime, Duration};
use portcullis_core::{
    AccountDirectory, AccountId, AttemptLedger, AttemptRecord, CredentialVerifier, Error,
    LoginService, ManualClock, ThrottleConfig, ThrottleService,
    error::StorageError,
    repositories::InMemoryAttemptLedger,
};
use portcullis_axum::GENERIC_ERROR_MESSAGE;
use serde_json::{Value, json};
use tower::ServiceExt;

struct Users(HashMap<String, String>);

#[async_trait]
impl AccountDirectory for Users {
    async fn account_exists(&self, account: &AccountId) -> Result<bool, Error> {
        Ok(self.0.contains_key(account.as_str()))
    }
}

#[async_trait]
impl CredentialVerifier for Users {
    async fn verify(&self, account: &AccountId, secret: &str) -> Result<bool, Error> {
        Ok(self.0.get(account.as_str()).is_some_and(|p| p == secret))
    }
}

/// A ledger whose backing store is gone.
struct DownLedger;

#[async_trait]
impl AttemptLedger for DownLedger {
    async fn find(&self, _account: &AccountId) -> Result<Option<AttemptRecord>, Error> {
        Err(StorageError::Unavailable("connection refused".into()).into())
    }

    async fn save(&self, _record: &AttemptRecord) -> Result<AttemptRecord, Error> {
        Err(StorageError::Unavailable("connection refused".into()).into())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Err(StorageError::Unavailable("connection refused".into()).into())
    }
}

fn users() -> Arc<Users> {
    Arc::new(Users(HashMap::from([(
        "user@example.com".to_string(),
        "hunter2".to_string(),
    )])))
}

fn app_with<L: AttemptLedger>(ledger: L, clock: Arc<ManualClock>) -> Router {
    let throttle = ThrottleService::new(Arc::new(ledger), ThrottleConfig::default())
        .with_clock(clock);
    let users = users();
    let login = LoginService::new(Arc::new(throttle), users.clone(), users);
    portcullis_axum::routes(Arc::new(login))
}

fn app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    ));
    (app_with(InMemoryAttemptLedger::new(), clock.clone()), clock)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn wrong_password() -> Value {
    json!({ "accountId": "user@example.com", "password": "nope" })
}

#[tokio::test]
async fn test_lockout_over_http() {
    let (app, clock) = app();

    let (status, body) = post(&app, "/login", wrong_password()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "invalid_credentials");
    assert_eq!(body["attemptsLeft"], 2);
    assert_eq!(body["legacy"], "ATTEMPTS:2:Invalid credentials");

    post(&app, "/login", wrong_password()).await;
    let (status, body) = post(&app, "/login", wrong_password()).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["status"], "locked");
    assert_eq!(body["timeLeft"], 60);

    let (status, body) = post(&app, "/status", json!({ "accountId": "user@example.com" })).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["isLocked"], true);
    assert_eq!(body["timeLeft"], 60);

    clock.advance(Duration::seconds(10));
    let (status, body) = post(&app, "/login", wrong_password()).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["timeLeft"], 50);

    clock.advance(Duration::seconds(51));
    let (status, body) = post(&app, "/status", json!({ "email": "user@example.com" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "isLocked": false, "attemptsLeft": 3, "failureCount": 0 })
    );
}

#[tokio::test]
async fn test_success_resets_attempts() {
    let (app, _clock) = app();

    post(&app, "/login", wrong_password()).await;
    let (status, body) = post(
        &app,
        "/login",
        json!({ "email": " User@Example.com ", "password": "hunter2" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "authenticated", "accountId": "user@example.com" })
    );

    let (_, body) = post(&app, "/status", json!({ "accountId": "user@example.com" })).await;
    assert_eq!(
        body,
        json!({ "isLocked": false, "attemptsLeft": 3, "failureCount": 0 })
    );
}

#[tokio::test]
async fn test_unknown_account() {
    let (app, _clock) = app();

    let (status, body) = post(&app, "/status", json!({ "accountId": "who@example.com" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, body) = post(
        &app,
        "/login",
        json!({ "accountId": "who@example.com", "password": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "account_not_found");
}

#[tokio::test]
async fn test_malformed_requests() {
    let (app, _clock) = app();

    let (status, body) = post(&app, "/status", json!({ "accountId": "not-an-email" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = post(&app, "/login", json!({ "accountId": "user@example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_is_generic_500() {
    let clock = Arc::new(ManualClock::default());
    let app = app_with(DownLedger, clock);

    let (status, body) = post(&app, "/login", wrong_password()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": GENERIC_ERROR_MESSAGE }));

    let (status, body) = post(&app, "/status", json!({ "accountId": "user@example.com" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": GENERIC_ERROR_MESSAGE }));
}

#[tokio::test]
async fn test_health() {
    let (app, _clock) = app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let down = app_with(DownLedger, Arc::new(ManualClock::default()));
    let response = down
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
