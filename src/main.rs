//! wallet_core - atomic funds transfers between wallet accounts
//!
//! Command-line entry point. Configuration comes from the environment
//! (optionally a `.env` file); all commands run against PostgreSQL.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_core::cli::{self, Cli, Commands};
use wallet_core::usecase::CreateTransactionCommand;
use wallet_core::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_core=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing::info!(environment = %config.environment, "Connecting to database...");
    let pool = db::connect(&config).await?;
    db::verify_connection(&pool).await?;

    let result = match cli.command {
        Commands::CheckSchema => cli::handle_check_schema(&pool).await,
        Commands::AddCustomer { name, email } => cli::handle_add_customer(&pool, name, email).await,
        Commands::OpenAccount { customer_id } => cli::handle_open_account(&pool, customer_id).await,
        Commands::Transfer { from, to, amount } => {
            let command = CreateTransactionCommand::new(from, to, amount);
            cli::handle_transfer(&pool, &config, command).await
        }
    };

    pool.close().await;
    result
}
