//! Unit of Work Errors
//!
//! Error types for storage access and transaction-scope coordination.

use uuid::Uuid;

/// Errors reported by a storage backend or a gateway bound to it
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Entity lookup by id found nothing
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Another transaction committed a change to a row this one read or wrote
    #[error("Write conflict on {entity} {id}")]
    Conflict { entity: &'static str, id: Uuid },

    /// The transaction this handle was bound to is already committed or rolled back
    #[error("Transaction is already closed")]
    TransactionClosed,

    /// A stored row could not be turned back into an entity
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Check if this error is a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Check if retrying the whole transaction may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

/// Errors raised by the [`UnitOfWork`](super::UnitOfWork) itself
#[derive(Debug, thiserror::Error)]
pub enum UnitOfWorkError {
    /// `run` was called while a scope is already open on this instance
    #[error("transaction is already started")]
    TransactionAlreadyActive,

    /// Commit requested with no open scope
    #[error("no transaction is active")]
    NoActiveTransaction,

    /// Repository name was never registered
    #[error("repository '{0}' is not registered")]
    UnknownRepository(String),

    /// Repository exists but was requested as a different type
    #[error("repository '{name}' is not a {expected}")]
    RepositoryTypeMismatch { name: String, expected: &'static str },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The triggering failure and the rollback that followed both failed
    #[error("transaction error: {cause} | rollback error: {rollback}")]
    RollbackFailed { cause: String, rollback: StorageError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_failed_names_both_errors() {
        let err = UnitOfWorkError::RollbackFailed {
            cause: "insert failed".to_string(),
            rollback: StorageError::Backend("connection reset".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "transaction error: insert failed | rollback error: connection reset"
        );
    }

    #[test]
    fn test_not_found() {
        let id = Uuid::new_v4();
        let err = StorageError::not_found("Account", id);

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), format!("Account not found: {id}"));
        assert!(!StorageError::TransactionClosed.is_not_found());
    }
}
