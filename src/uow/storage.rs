//! Storage capabilities
//!
//! The unit of work only needs two things from a backend: a way to begin a
//! transaction, and a transaction that can commit or roll back.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::StorageError;

/// A backend that can open storage transactions
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    type Tx: StorageTx;

    async fn begin(&self) -> Result<Self::Tx, StorageError>;
}

/// An open storage transaction.
///
/// Dropping an open transaction must discard its writes.
#[async_trait]
pub trait StorageTx: Send + 'static {
    async fn commit(&mut self) -> Result<(), StorageError>;

    /// Discard the transaction. Must be a no-op once the transaction is closed.
    async fn rollback(&mut self) -> Result<(), StorageError>;

    fn is_open(&self) -> bool;
}

/// Shared handle to the active storage transaction.
///
/// Repositories built by a unit of work all hold clones of the same handle,
/// so every write of one scope goes through one transaction.
#[derive(Debug)]
pub struct TxHandle<T>(Arc<Mutex<T>>);

impl<T> Clone for TxHandle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: StorageTx> TxHandle<T> {
    pub fn new(tx: T) -> Self {
        Self(Arc::new(Mutex::new(tx)))
    }

    /// Check if both handles point at the same transaction
    pub fn same_transaction(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Wait for exclusive access to the transaction
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().await
    }
}
