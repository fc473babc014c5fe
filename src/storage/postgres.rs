//! PostgreSQL storage
//!
//! Gateways run every statement on the unit of work's open `sqlx` transaction.
//! Account reads take a row lock (`FOR UPDATE`) so two concurrent transfers
//! touching the same account serialize instead of losing an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Account, Customer, TransactionRecord, TransactionStatus};
use crate::gateway::{
    AccountGateway, CustomerGateway, SharedAccountGateway, SharedCustomerGateway,
    SharedTransactionGateway, TransactionGateway, ACCOUNT_GATEWAY, CUSTOMER_GATEWAY,
    TRANSACTION_GATEWAY,
};
use crate::uow::{Storage, StorageError, StorageTx, TxHandle, UnitOfWork};

/// PostgreSQL backend
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx: Some(tx) })
    }
}

/// Open `sqlx` transaction. Empty once committed or rolled back.
#[derive(Debug)]
pub struct PgTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTransaction {
    /// Connection of the open transaction
    pub fn connection(&mut self) -> Result<&mut PgConnection, StorageError> {
        self.tx.as_deref_mut().ok_or(StorageError::TransactionClosed)
    }
}

#[async_trait]
impl StorageTx for PgTransaction {
    async fn commit(&mut self) -> Result<(), StorageError> {
        let tx = self.tx.take().ok_or(StorageError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StorageError> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }
}

// =========================================================================
// Gateways
// =========================================================================

type AccountRow = (Uuid, Uuid, Decimal, DateTime<Utc>, DateTime<Utc>);
type TransactionRow = (Uuid, Uuid, Uuid, Decimal, String, DateTime<Utc>);
type CustomerRow = (Uuid, String, String, DateTime<Utc>, DateTime<Utc>);

pub struct PgAccountGateway {
    tx: TxHandle<PgTransaction>,
}

impl PgAccountGateway {
    pub fn new(tx: TxHandle<PgTransaction>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AccountGateway for PgAccountGateway {
    async fn create(&self, account: &Account) -> Result<(), StorageError> {
        let mut tx = self.tx.lock().await;
        let conn = tx.connection()?;

        let customer_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1)")
                .bind(account.customer_id())
                .fetch_one(&mut *conn)
                .await?;
        if !customer_exists {
            return Err(StorageError::not_found("Customer", account.customer_id()));
        }

        sqlx::query(
            r#"
            INSERT INTO accounts (id, customer_id, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id())
        .bind(account.customer_id())
        .bind(account.balance())
        .bind(account.created_at())
        .bind(account.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Account, StorageError> {
        let mut tx = self.tx.lock().await;

        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, balance, created_at, updated_at
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(tx.connection()?)
        .await?;

        let (id, customer_id, balance, created_at, updated_at) =
            row.ok_or(StorageError::not_found("Account", id))?;
        Account::from_stored(id, customer_id, balance, created_at, updated_at)
            .map_err(|e| StorageError::CorruptRecord(format!("account {id}: {e}")))
    }

    async fn update_balance(&self, id: Uuid, balance: Decimal) -> Result<(), StorageError> {
        let mut tx = self.tx.lock().await;

        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(balance)
        .execute(tx.connection()?)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Account", id));
        }
        Ok(())
    }
}

pub struct PgTransactionGateway {
    tx: TxHandle<PgTransaction>,
}

impl PgTransactionGateway {
    pub fn new(tx: TxHandle<PgTransaction>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl TransactionGateway for PgTransactionGateway {
    async fn create(&self, transaction: &TransactionRecord) -> Result<(), StorageError> {
        let mut tx = self.tx.lock().await;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, from_account_id, to_account_id, amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.from_account_id)
        .bind(transaction.to_account_id)
        .bind(transaction.amount)
        .bind(transaction.status.as_str())
        .bind(transaction.created_at)
        .execute(tx.connection()?)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<TransactionRecord, StorageError> {
        let mut tx = self.tx.lock().await;

        let row: Option<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, from_account_id, to_account_id, amount, status, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(tx.connection()?)
        .await?;

        let (id, from_account_id, to_account_id, amount, status, created_at) =
            row.ok_or(StorageError::not_found("Transaction", id))?;
        let status: TransactionStatus = status
            .parse()
            .map_err(|e| StorageError::CorruptRecord(format!("transaction {id}: {e}")))?;

        Ok(TransactionRecord {
            id,
            from_account_id,
            to_account_id,
            amount,
            status,
            created_at,
        })
    }
}

pub struct PgCustomerGateway {
    tx: TxHandle<PgTransaction>,
}

impl PgCustomerGateway {
    pub fn new(tx: TxHandle<PgTransaction>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl CustomerGateway for PgCustomerGateway {
    async fn save(&self, customer: &Customer) -> Result<(), StorageError> {
        let mut tx = self.tx.lock().await;

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, email = EXCLUDED.email, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(tx.connection()?)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Customer, StorageError> {
        let mut tx = self.tx.lock().await;

        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, email, created_at, updated_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(tx.connection()?)
        .await?;

        let (id, name, email, created_at, updated_at) =
            row.ok_or(StorageError::not_found("Customer", id))?;
        Ok(Customer {
            id,
            name,
            email,
            created_at,
            updated_at,
        })
    }
}

/// Register the PostgreSQL gateways under their standard names
pub fn register_gateways(uow: &mut UnitOfWork<PgStorage>) {
    uow.add(ACCOUNT_GATEWAY, |tx| {
        Arc::new(PgAccountGateway::new(tx)) as SharedAccountGateway
    });
    uow.add(TRANSACTION_GATEWAY, |tx| {
        Arc::new(PgTransactionGateway::new(tx)) as SharedTransactionGateway
    });
    uow.add(CUSTOMER_GATEWAY, |tx| {
        Arc::new(PgCustomerGateway::new(tx)) as SharedCustomerGateway
    });
}
