//! Command-line interface
//!
//! Every command runs against PostgreSQL. `transfer` flushes pending events
//! with bounded retry before returning.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::Customer;
use crate::events::{EventPublisher, HttpProducer, LogProducer, Producer};
use crate::gateway::{SharedCustomerGateway, CUSTOMER_GATEWAY};
use crate::storage::postgres::{self, PgStorage};
use crate::uow::UnitOfWork;
use crate::usecase::{
    CreateAccountCommand, CreateAccountUseCase, CreateTransactionCommand, CreateTransactionUseCase,
};

/// Pause before the second publish round; later rounds wait proportionally longer
const PUBLISH_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "wallet_core")]
#[command(about = "Wallet core - atomic funds transfers between accounts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify that the database schema is in place
    CheckSchema,

    /// Register a customer
    AddCustomer {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },

    /// Open a zero-balance account for a customer
    OpenAccount {
        #[arg(long, value_name = "CUSTOMER_ID")]
        customer_id: Uuid,
    },

    /// Transfer funds between two accounts
    Transfer {
        #[arg(long, value_name = "ACCOUNT_ID")]
        from: Uuid,
        #[arg(long, value_name = "ACCOUNT_ID")]
        to: Uuid,
        #[arg(long)]
        amount: Decimal,
    },
}

fn unit_of_work(pool: &PgPool) -> UnitOfWork<PgStorage> {
    let mut uow = UnitOfWork::new(Arc::new(PgStorage::new(pool.clone())));
    postgres::register_gateways(&mut uow);
    uow
}

pub async fn handle_check_schema(pool: &PgPool) -> anyhow::Result<()> {
    if !crate::db::check_schema(pool).await? {
        anyhow::bail!("Database schema incomplete, apply migrations/ first");
    }
    println!("Schema OK");
    Ok(())
}

pub async fn handle_add_customer(pool: &PgPool, name: String, email: String) -> anyhow::Result<()> {
    let customer = Customer::new(name, email)?;
    let uow = unit_of_work(pool);

    let gateway = uow
        .get_repository::<SharedCustomerGateway>(CUSTOMER_GATEWAY)
        .await?;
    gateway.save(&customer).await?;
    uow.commit_or_rollback().await?;

    tracing::info!(customer_id = %customer.id, "Customer registered");
    println!("{}", customer.id);
    Ok(())
}

pub async fn handle_open_account(pool: &PgPool, customer_id: Uuid) -> anyhow::Result<()> {
    let usecase = CreateAccountUseCase::new(unit_of_work(pool));
    let output = usecase.execute(CreateAccountCommand { customer_id }).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub async fn handle_transfer(
    pool: &PgPool,
    config: &Config,
    command: CreateTransactionCommand,
) -> anyhow::Result<()> {
    match &config.event_sink_url {
        Some(url) => {
            let producer = HttpProducer::new(url.clone(), config.event_topic.clone());
            run_transfer(pool, config, producer, command).await
        }
        None => run_transfer(pool, config, LogProducer, command).await,
    }
}

async fn run_transfer<P: Producer>(
    pool: &PgPool,
    config: &Config,
    producer: P,
    command: CreateTransactionCommand,
) -> anyhow::Result<()> {
    let publisher = Arc::new(EventPublisher::with_timeout(
        Arc::new(producer),
        config.event_send_timeout,
    ));
    let usecase = CreateTransactionUseCase::new(unit_of_work(pool), Arc::clone(&publisher));

    let output = usecase.execute(command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    // execute already made one attempt
    let rounds = config.event_publish_rounds.saturating_sub(1);
    let report = publisher.publish_with_retry(rounds, PUBLISH_BACKOFF).await;
    if !report.is_drained() {
        tracing::error!(
            transaction_id = %output.id,
            pending = report.pending,
            "Events could not be delivered"
        );
    }
    Ok(())
}
