use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use portcullis::{
    AccountId, DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_ATTEMPTS, PortcullisBuilder,
    ReadFailurePolicy, SqliteStorage, ThrottleConfig, ValidationError,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Command line interface for Portcullis
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "PORTCULLIS_DATABASE_URL", default_value = "sqlite://portcullis.db")]
    db_url: String,

    /// Consecutive failures before an account locks
    #[arg(long, env = "PORTCULLIS_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Lockout length in seconds
    #[arg(long, env = "PORTCULLIS_LOCKOUT_SECONDS", default_value_t = DEFAULT_LOCKOUT_SECONDS)]
    lockout_seconds: i64,

    /// Treat the account as open when the ledger cannot be read
    #[arg(long, env = "PORTCULLIS_FAIL_OPEN_READS")]
    fail_open_reads: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Show an account's throttle state
    Status {
        #[arg(long)]
        account: String,
    },
    /// Clear an account's failures and lockout
    Reset {
        #[arg(long)]
        account: String,
    },
    /// Print version information
    Version,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetReport {
    account_id: AccountId,
    was_locked: bool,
}

impl Cli {
    fn throttle_config(&self) -> Result<ThrottleConfig, ValidationError> {
        let policy = if self.fail_open_reads {
            ReadFailurePolicy::FailOpen
        } else {
            ReadFailurePolicy::FailClosed
        };
        let lockout = Duration::try_seconds(self.lockout_seconds).ok_or_else(|| {
            ValidationError::InvalidConfig(format!(
                "lockout of {} seconds is out of range",
                self.lockout_seconds
            ))
        })?;
        let config =
            ThrottleConfig::new(self.max_attempts, lockout).with_read_failure_policy(policy);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Migrate => {
            println!("Running migrations...");
            let storage = SqliteStorage::connect(&cli.db_url)
                .await
                .context("failed to open database")?;
            storage.migrate().await.context("failed to run migrations")?;
        }
        Commands::Status { account } => {
            let account = AccountId::parse(account)?;
            let portcullis = PortcullisBuilder::new()
                .with_sqlite(&cli.db_url)
                .await?
                .with_throttle_config(cli.throttle_config()?)
                .build()
                .await?;

            let snapshot = portcullis.status(&account).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Reset { account } => {
            let account = AccountId::parse(account)?;
            let portcullis = PortcullisBuilder::new()
                .with_sqlite(&cli.db_url)
                .await?
                .with_throttle_config(cli.throttle_config()?)
                .build()
                .await?;

            let was_locked = portcullis.reset(&account).await?;
            let report = ResetReport {
                account_id: account,
                was_locked,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Version => {
            println!("Portcullis v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
