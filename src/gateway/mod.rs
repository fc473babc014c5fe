//! Gateway capabilities
//!
//! Narrow persistence contracts consumed by the use cases. Storage adapters
//! implement them against a transaction handle and register them with a
//! [`UnitOfWork`](crate::uow::UnitOfWork) under the names below.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Account, Customer, TransactionRecord};
use crate::uow::StorageError;

/// Registration name of the account gateway
pub const ACCOUNT_GATEWAY: &str = "AccountGateway";

/// Registration name of the transaction gateway
pub const TRANSACTION_GATEWAY: &str = "TransactionGateway";

/// Registration name of the customer gateway
pub const CUSTOMER_GATEWAY: &str = "CustomerGateway";

#[async_trait]
pub trait AccountGateway: Send + Sync {
    async fn create(&self, account: &Account) -> Result<(), StorageError>;

    /// Fails with `StorageError::NotFound` when no account has this id
    async fn get_by_id(&self, id: Uuid) -> Result<Account, StorageError>;

    async fn update_balance(&self, id: Uuid, balance: Decimal) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TransactionGateway: Send + Sync {
    async fn create(&self, transaction: &TransactionRecord) -> Result<(), StorageError>;

    async fn get_by_id(&self, id: Uuid) -> Result<TransactionRecord, StorageError>;
}

#[async_trait]
pub trait CustomerGateway: Send + Sync {
    async fn save(&self, customer: &Customer) -> Result<(), StorageError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Customer, StorageError>;
}

pub type SharedAccountGateway = Arc<dyn AccountGateway>;
pub type SharedTransactionGateway = Arc<dyn TransactionGateway>;
pub type SharedCustomerGateway = Arc<dyn CustomerGateway>;
