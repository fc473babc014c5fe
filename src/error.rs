//! Error handling module
//!
//! Application-wide error type returned by the use cases.

use crate::domain::DomainError;
use crate::uow::{StorageError, UnitOfWorkError};

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Caller errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Persistence and coordination
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),
}

impl AppError {
    /// Stable machine-readable code for the error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Domain(domain_err) => match domain_err {
                DomainError::MissingAccount => "missing_account",
                DomainError::InvalidAmount(_) => "invalid_amount",
                DomainError::InsufficientFunds { .. } => "insufficient_funds",
                DomainError::AlreadyCompleted(_) => "already_completed",
                DomainError::TransferAborted(_) => "transfer_aborted",
                DomainError::SameAccountTransfer => "same_account_transfer",
                DomainError::BalanceOverflow(_) => "balance_overflow",
                DomainError::InvalidCustomer(_) => "invalid_customer",
            },
            AppError::Storage(StorageError::NotFound { .. })
            | AppError::UnitOfWork(UnitOfWorkError::Storage(StorageError::NotFound { .. })) => {
                "not_found"
            }
            AppError::Storage(StorageError::Conflict { .. })
            | AppError::UnitOfWork(UnitOfWorkError::Storage(StorageError::Conflict { .. })) => {
                "conflict"
            }
            AppError::Storage(_) => "storage_error",
            AppError::UnitOfWork(UnitOfWorkError::RollbackFailed { .. }) => "rollback_failed",
            AppError::UnitOfWork(_) => "transaction_error",
        }
    }

    /// Check if the caller can fix this error by changing the request
    pub fn is_client_error(&self) -> bool {
        match self {
            AppError::Domain(e) => e.is_client_error(),
            _ => self.is_not_found(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::Storage(StorageError::NotFound { .. })
                | AppError::UnitOfWork(UnitOfWorkError::Storage(StorageError::NotFound { .. }))
        )
    }

    /// Lost a write race with another scope; the whole scope can be retried
    pub fn is_conflict(&self) -> bool {
        match self {
            AppError::Storage(e) | AppError::UnitOfWork(UnitOfWorkError::Storage(e)) => {
                e.is_conflict()
            }
            _ => false,
        }
    }
}
