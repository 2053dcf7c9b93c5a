use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{Router, routing::get};
use portcullis::{AccountDirectory, AccountId, CredentialVerifier, Error, PortcullisBuilder};
use tracing::info;

/// Hard-coded users. Real applications check a user table and a password hash.
struct DemoUsers {
    passwords: HashMap<AccountId, String>,
}

impl DemoUsers {
    fn new() -> anyhow::Result<Self> {
        let mut passwords = HashMap::new();
        passwords.insert(AccountId::parse("alice@example.com")?, "wonderland".to_string());
        passwords.insert(AccountId::parse("bob@example.com")?, "builder".to_string());
        Ok(Self { passwords })
    }
}

#[async_trait]
impl AccountDirectory for DemoUsers {
    async fn account_exists(&self, account: &AccountId) -> Result<bool, Error> {
        Ok(self.passwords.contains_key(account))
    }
}

#[async_trait]
impl CredentialVerifier for DemoUsers {
    async fn verify(&self, account: &AccountId, secret: &str) -> Result<bool, Error> {
        Ok(self.passwords.get(account).is_some_and(|p| p == secret))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,axum_login_demo=debug,portcullis_core=debug")
        .init();

    let database_url =
        std::env::var("PORTCULLIS_DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    let portcullis = PortcullisBuilder::new()
        .with_sqlite(&database_url)
        .await?
        .apply_migrations(true)
        .build()
        .await?;
    info!(config = ?portcullis.config(), "Throttle ready");

    let users = Arc::new(DemoUsers::new()?);
    let login = Arc::new(portcullis.login_service(users.clone(), users));

    let app = Router::new()
        .route("/", get(|| async { "portcullis demo: POST /auth/login, POST /auth/status" }))
        .nest("/auth", portcullis_axum::routes(login));

    info!("Server starting on http://localhost:3000");
    info!("  POST /auth/login    - {{\"accountId\", \"password\"}}");
    info!("  POST /auth/status   - {{\"accountId\"}}");
    info!("  GET  /auth/health   - Health check");

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    axum::serve(listener, app).await?;

    Ok(())
}
