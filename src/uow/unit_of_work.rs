//! Unit of Work
//!
//! Coordinates one storage transaction across several repositories. Each
//! repository is registered by name with a factory; the factory is invoked
//! with the active transaction handle when the repository is requested, so
//! everything obtained inside one scope writes through the same transaction.
//!
//! A `UnitOfWork` serves one scope at a time. Use [`UnitOfWork::fork`] to get
//! an independent instance per request.

use futures::future::BoxFuture;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Storage, StorageTx, TxHandle, UnitOfWorkError};

type RepositoryFactory<T> = Arc<dyn Fn(TxHandle<T>) -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Transaction-scope coordinator
pub struct UnitOfWork<S: Storage> {
    storage: Arc<S>,
    repositories: Arc<HashMap<String, RepositoryFactory<S::Tx>>>,
    active: Mutex<Option<TxHandle<S::Tx>>>,
}

impl<S: Storage> UnitOfWork<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            repositories: Arc::new(HashMap::new()),
            active: Mutex::new(None),
        }
    }

    /// A fresh coordinator with the same storage and registrations but no open scope
    pub fn fork(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            repositories: Arc::clone(&self.repositories),
            active: Mutex::new(None),
        }
    }

    /// Register a repository factory under `name`, replacing any previous one
    pub fn add<R, F>(&mut self, name: impl Into<String>, factory: F)
    where
        R: Any + Send + Sync,
        F: Fn(TxHandle<S::Tx>) -> R + Send + Sync + 'static,
    {
        let factory: RepositoryFactory<S::Tx> = Arc::new(move |tx: TxHandle<S::Tx>| {
            Box::new(factory(tx)) as Box<dyn Any + Send + Sync>
        });
        Arc::make_mut(&mut self.repositories).insert(name.into(), factory);
    }

    pub fn remove(&mut self, name: &str) {
        Arc::make_mut(&mut self.repositories).remove(name);
    }

    /// Check if a scope is currently open
    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// Get the repository registered under `name`, bound to the active
    /// transaction. Begins the transaction if none is open yet.
    pub async fn get_repository<R: Any>(&self, name: &str) -> Result<R, UnitOfWorkError> {
        let factory = self
            .repositories
            .get(name)
            .cloned()
            .ok_or_else(|| UnitOfWorkError::UnknownRepository(name.to_string()))?;

        let handle = match self.active_handle() {
            Some(handle) => handle,
            None => {
                let tx = self.storage.begin().await?;
                tracing::debug!(repository = name, "Transaction begun lazily");
                self.install_or_reuse(TxHandle::new(tx))
            }
        };

        factory(handle)
            .downcast::<R>()
            .map(|repository| *repository)
            .map_err(|_| UnitOfWorkError::RepositoryTypeMismatch {
                name: name.to_string(),
                expected: type_name::<R>(),
            })
    }

    /// Run `work` inside a new transaction scope.
    ///
    /// Commits when `work` succeeds and rolls back when it fails. If the
    /// rollback that follows a failure also fails, both are reported in one
    /// `UnitOfWorkError::RollbackFailed`. If `work` panics or the returned
    /// future is dropped, the scope is released and its writes discarded.
    pub async fn run<F, T, E>(&self, work: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s Self) -> BoxFuture<'s, Result<T, E>>,
        E: From<UnitOfWorkError> + fmt::Display,
    {
        if self.is_active() {
            return Err(UnitOfWorkError::TransactionAlreadyActive.into());
        }

        let tx = self.storage.begin().await.map_err(UnitOfWorkError::from)?;
        if !self.install(TxHandle::new(tx)) {
            return Err(UnitOfWorkError::TransactionAlreadyActive.into());
        }
        let _scope = ScopeGuard { active: &self.active };
        tracing::debug!("Transaction scope opened");

        match work(self).await {
            Ok(value) => {
                self.commit_or_rollback().await?;
                Ok(value)
            }
            Err(err) => match self.rollback().await {
                Ok(()) => {
                    tracing::debug!(error = %err, "Transaction scope rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    tracing::error!(error = %err, rollback_error = %rollback, "Rollback failed");
                    Err(UnitOfWorkError::RollbackFailed {
                        cause: err.to_string(),
                        rollback: into_storage_error(rollback),
                    }
                    .into())
                }
            },
        }
    }

    /// Commit the active transaction, rolling back if the commit fails
    pub async fn commit_or_rollback(&self) -> Result<(), UnitOfWorkError> {
        let handle = self.take_active().ok_or(UnitOfWorkError::NoActiveTransaction)?;
        let mut tx = handle.lock().await;

        match tx.commit().await {
            Ok(()) => {
                tracing::debug!("Transaction committed");
                Ok(())
            }
            Err(commit) => match tx.rollback().await {
                Ok(()) => {
                    tracing::warn!(error = %commit, "Commit failed, transaction rolled back");
                    Err(UnitOfWorkError::Storage(commit))
                }
                Err(rollback) => {
                    tracing::error!(
                        error = %commit,
                        rollback_error = %rollback,
                        "Commit and rollback failed"
                    );
                    Err(UnitOfWorkError::RollbackFailed {
                        cause: commit.to_string(),
                        rollback,
                    })
                }
            },
        }
    }

    /// Roll back the active transaction. No-op when no scope is open.
    pub async fn rollback(&self) -> Result<(), UnitOfWorkError> {
        let Some(handle) = self.take_active() else {
            return Ok(());
        };
        let mut tx = handle.lock().await;
        tx.rollback().await?;
        Ok(())
    }

    // =========================================================================
    // Scope slot (never held across an await)
    // =========================================================================

    fn slot(&self) -> MutexGuard<'_, Option<TxHandle<S::Tx>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_handle(&self) -> Option<TxHandle<S::Tx>> {
        self.slot().clone()
    }

    fn take_active(&self) -> Option<TxHandle<S::Tx>> {
        self.slot().take()
    }

    /// Store `handle` unless a scope is already open. Returns whether it was stored.
    fn install(&self, handle: TxHandle<S::Tx>) -> bool {
        let mut slot = self.slot();
        if slot.is_some() {
            return false;
        }
        *slot = Some(handle);
        true
    }

    /// Store `handle`, or keep the one that won a concurrent begin
    fn install_or_reuse(&self, handle: TxHandle<S::Tx>) -> TxHandle<S::Tx> {
        self.slot().get_or_insert(handle).clone()
    }
}

impl<S: Storage> fmt::Debug for UnitOfWork<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.repositories.keys().collect();
        names.sort();
        f.debug_struct("UnitOfWork")
            .field("repositories", &names)
            .field("active", &self.is_active())
            .finish()
    }
}

fn into_storage_error(err: UnitOfWorkError) -> super::StorageError {
    match err {
        UnitOfWorkError::Storage(e) => e,
        other => super::StorageError::Backend(other.to_string()),
    }
}

/// Clears the scope slot when `run` exits by any path. Dropping the last
/// handle drops the transaction, which discards anything not committed.
struct ScopeGuard<'a, T: StorageTx> {
    active: &'a Mutex<Option<TxHandle<T>>>,
}

impl<T: StorageTx> Drop for ScopeGuard<'_, T> {
    fn drop(&mut self) {
        let leaked = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if leaked.is_some() {
            tracing::warn!("Transaction scope released without commit, discarding writes");
        }
    }
}
